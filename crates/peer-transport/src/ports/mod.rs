//! # Ports Layer
//!
//! Inbound: the API the node uses to reach peers.
//! Outbound: the collaborators the transport depends on.

pub mod inbound;
pub mod outbound;

pub use inbound::{BroadcastReport, PeerReply, PeerTransportApi, RequestSpec, RequestTarget};
pub use outbound::{
    BinaryCodec, ChainRelay, ChainStore, HttpExchange, Mempool, Multisignatures,
    OutboundRequest, PeerRegistry, RawResponse, RequestMethod, SyncStatus, TimeSource,
};
