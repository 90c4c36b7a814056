//! Tower layers of the peer surface.
//!
//! Order, outermost first: body limit, tracing, protocol response headers,
//! readiness, handshake.

pub mod handshake;
pub mod protocol_headers;
pub mod readiness;
pub mod trace;

pub use handshake::HandshakeLayer;
pub use protocol_headers::ProtocolHeadersLayer;
pub use readiness::ReadinessLayer;
pub use trace::PeerSpanLayer;
