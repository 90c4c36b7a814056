//! # Adapters Layer
//!
//! Concrete implementations behind the ports: the axum peer surface, the
//! reqwest client, the bincode codec, the wall clock and in-memory fakes.

pub mod clock;
pub mod codec;
pub mod http_client;
pub mod memory;
pub mod server;

pub use clock::SystemTimeSource;
pub use codec::BincodeCodec;
pub use http_client::ReqwestExchange;
