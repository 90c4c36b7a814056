//! # Peer Transport
//!
//! Peer-facing transport of a delegate-based blockchain node.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      PEER TRANSPORT                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  inbound  /peer/*                                            │
//! │    BodyLimit → Tracing → ProtocolHeaders → Readiness         │
//! │      → Handshake → handlers                                  │
//! │                                                              │
//! │  service  PeerTransport                                      │
//! │    admission (freshness, replay LRU, serialized insert)      │
//! │    gossip / sync / relay (hashsum, dedup set)                │
//! │    outbound (get_from_peer, random peer, reputation)         │
//! │    broadcast (sample of 20, 5 in flight)                     │
//! │                                                              │
//! │  event forwarder  bus → broadcast                            │
//! └──────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!     PeerRegistry        Mempool/ChainStore     ChainRelay
//! ```
//!
//! Collaborators are injected through the traits in [`ports::outbound`];
//! in-memory implementations live in [`adapters::memory`].
//!
//! ## Usage
//!
//! ```ignore
//! use peer_transport::{PeerTransport, TransportConfig};
//!
//! let transport = PeerTransport::new(TransportConfig::default(), collaborators)?;
//! let forwarder = transport.spawn_event_forwarder(&bus);
//! transport.mark_ready();
//! transport.serve(listener, shutdown).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod telemetry;

pub use domain::{ConfigError, Peer, PeerSelector, TransportConfig, TransportError};
pub use ports::{BroadcastReport, PeerReply, PeerTransportApi, RequestSpec, RequestTarget};
pub use service::{Collaborators, MessageOutcome, PeerTransport, RemotePeer};
