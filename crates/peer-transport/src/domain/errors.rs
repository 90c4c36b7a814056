//! # Error Types
//!
//! Collaborator failures, outbound request failures, and the protocol-level
//! errors a handler can answer with. `TransportError` display strings are part
//! of the wire protocol: peers match on them.

use serde_json::Value;
use shared_types::TypeError;
use thiserror::Error;

use super::peer::Peer;

/// Peer registry failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("peer registry error: {0}")]
pub struct RegistryError(pub String);

/// Mempool rejection. The message is returned verbatim to the submitting peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error("Transaction already in pool")]
    Duplicate,
    #[error("{0}")]
    Rejected(String),
}

/// Block/transaction store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain store error: {0}")]
pub struct StoreError(pub String);

/// Multisignature processing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MultisigError(pub String);

/// Failure reported by a side-chain handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Chain not found: {0}")]
    UnknownChain(String),
    #[error("{0}")]
    Handler(String),
}

/// Binary codec failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("codec error: {0}")]
pub struct CodecError(pub String);

/// Why a wire payload could not be turned into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("invalid base64 in `{0}`")]
    Base64(&'static str),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("malformed `{field}`: {reason}")]
    Json { field: &'static str, reason: String },
    #[error(transparent)]
    Invalid(#[from] TypeError),
}

/// Classification of a failed outbound exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ConnectionRefused,
    /// The peer answered with a status other than 200.
    Status(u16),
    Other,
}

impl FailureKind {
    /// Failures that mean the peer is gone rather than misbehaving.
    pub fn is_unreachable(self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionRefused)
    }
}

/// A failed outbound HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn status(code: u16) -> Self {
        Self::new(FailureKind::Status(code), format!("request status code {code}"))
    }
}

/// A single-peer request that failed, with whatever body the peer sent.
#[derive(Debug, Clone, Error)]
#[error("request to {} failed: {failure}", .peer.label())]
pub struct PeerRequestError {
    pub peer: Peer,
    pub failure: RequestFailure,
    pub body: Option<Value>,
}

/// Failure of a request that first has to pick a peer.
#[derive(Debug, Clone, Error)]
pub enum OutboundError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("No peers in db")]
    NoPeers,
    #[error(transparent)]
    Request(#[from] PeerRequestError),
}

/// Everything a peer-facing handler or guard can answer with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    // Guards
    #[error("Blockchain is loading")]
    Loading,
    #[error("Wrong header data")]
    WrongHeaderData,
    #[error("{0}")]
    InvalidHeaders(String),
    #[error("Request is made on the wrong network")]
    NetworkMismatch { expected: String, received: String },
    #[error("Version is not compatible")]
    IncompatibleVersion,
    #[error("API endpoint not found")]
    EndpointNotFound,
    #[error("Request body too large")]
    BodyTooLarge,

    // Schema
    #[error("Schema validation error")]
    SchemaValidation,
    #[error("Validation error")]
    Validation,
    #[error("{0}")]
    InvalidQuery(String),

    // Blocks and signatures
    #[error("Common block not found")]
    CommonBlockNotFound,
    #[error("Failed to find common block")]
    CommonBlockLookup,
    #[error("Process signature error")]
    ProcessSignature,
    #[error(transparent)]
    Store(#[from] StoreError),

    // Admission
    #[error("Blockchain is not ready")]
    NotReady,
    #[error("Invalid transaction body")]
    InvalidTransactionBody,
    #[error("Already processed transaction {0}")]
    AlreadyProcessed(String),
    #[error("Already exists")]
    AlreadyExists,
    #[error("{0}")]
    Rejected(String),

    // Chain relay
    #[error("missed chain")]
    MissedChain,
    #[error("missed hash sum")]
    MissedHashSum,
    #[error("wrong hash sum")]
    WrongHashSum,
    #[error("{0}")]
    Downstream(String),
}
