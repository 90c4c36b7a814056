//! # Domain Layer
//!
//! Pure transport rules: configuration, protocol header checks, peer
//! records, slot arithmetic, the relay hashsum, replay guards and payload
//! decoding. No I/O happens here.

pub mod config;
pub mod errors;
pub mod hashsum;
pub mod headers;
pub mod payload;
pub mod peer;
pub mod replay;
pub mod slots;

pub use config::{
    AdmissionConfig, BlocksConfig, ConfigError, HttpConfig, PeersConfig, ProtocolConfig,
    SlotConfig, TransportConfig,
};
pub use errors::{
    CodecError, FailureKind, MempoolError, MultisigError, OutboundError, PayloadError,
    PeerRequestError, RegistryError, RelayError, RequestFailure, StoreError, TransportError,
};
pub use hashsum::hashsum;
pub use headers::{HeaderSet, InboundIdentity, ProtocolHeaders, RemoteIdentity};
pub use peer::{ip_to_u32, Peer, PeerSelector, PeerState};
pub use replay::{AntiReplayCache, MessageDedupSet};
pub use slots::SlotClock;
