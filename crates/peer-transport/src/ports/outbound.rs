//! # Driven Ports (Outbound SPI)
//!
//! Collaborators the transport needs from the host node. None of them are
//! owned by the transport; all are injected at construction so that the
//! transport can be exercised against in-memory fakes.

use async_trait::async_trait;
use serde_json::Value;
use shared_types::{Block, BlockPropose, BlockVotes, SignatureShare, Transaction};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::{
    CodecError, HeaderSet, MempoolError, MultisigError, Peer, PeerSelector, RegistryError,
    RelayError, RequestFailure, StoreError,
};

/// The peer list and its reputation bookkeeping.
#[async_trait]
pub trait PeerRegistry: Send + Sync {
    /// Random sample of non-banned peers matching `selector`.
    async fn list(&self, selector: &PeerSelector) -> Result<Vec<Peer>, RegistryError>;

    /// Up to `limit` peers including their side-chain tags, for `GET /peer/list`.
    async fn list_with_chain(&self, limit: usize) -> Result<Vec<Peer>, RegistryError>;

    /// Insert or refresh a peer.
    async fn update(&self, peer: Peer) -> Result<(), RegistryError>;

    /// Temporarily ban `(ip, port)`.
    async fn ban(&self, ip: u32, port: u16, duration: Duration) -> Result<(), RegistryError>;

    /// Forget `(ip, port)` entirely.
    async fn remove(&self, ip: u32, port: u16) -> Result<(), RegistryError>;

    /// Rebuild the peer pool from seed peers.
    async fn reset(&self) -> Result<(), RegistryError>;

    /// Whether a remote running `version` may talk to this node.
    fn is_compatible(&self, version: &str) -> bool;
}

/// The unconfirmed transaction pool.
#[async_trait]
pub trait Mempool: Send + Sync {
    async fn has_unconfirmed(&self, id: &str) -> bool;

    /// Apply validity rules and insert. Returns the accepted transaction.
    async fn receive_transaction(&self, transaction: Transaction)
        -> Result<Transaction, MempoolError>;

    async fn unconfirmed_list(&self) -> Vec<Transaction>;
}

/// Read access to stored blocks and confirmed transactions.
#[async_trait]
pub trait ChainStore: Send + Sync {
    async fn last_block(&self) -> Result<Block, StoreError>;

    async fn block_by_id(&self, id: &str) -> Result<Option<Block>, StoreError>;

    /// Blocks whose id is in `ids` and whose height is in `min..=max`,
    /// ascending by height.
    async fn blocks_by_ids(&self, ids: &[String], min: u64, max: u64)
        -> Result<Vec<Block>, StoreError>;

    /// Up to `limit` blocks with height strictly above `height`, ascending.
    async fn blocks_after(&self, height: u64, limit: usize) -> Result<Vec<Block>, StoreError>;

    /// Confirmed transactions with `above < height <= up_to`.
    async fn transactions_between(&self, above: u64, up_to: u64)
        -> Result<Vec<Transaction>, StoreError>;
}

/// Whether the node is still downloading the chain.
pub trait SyncStatus: Send + Sync {
    fn is_syncing(&self) -> bool;
}

/// Collection of co-signer signatures for multisignature transactions.
#[async_trait]
pub trait Multisignatures: Send + Sync {
    async fn process_signature(&self, share: SignatureShare) -> Result<(), MultisigError>;
}

/// Side-chain handlers the bridge messages are delivered to.
#[async_trait]
pub trait ChainRelay: Send + Sync {
    async fn message(&self, chain: &str, body: Value) -> Result<Value, RelayError>;

    async fn request(
        &self,
        chain: &str,
        method: &str,
        path: &str,
        query: Value,
    ) -> Result<Value, RelayError>;
}

/// The node-specific binary encoding of gossip entities.
pub trait BinaryCodec: Send + Sync {
    fn encode_block(&self, block: &Block) -> Result<Vec<u8>, CodecError>;
    fn decode_block(&self, bytes: &[u8]) -> Result<Block, CodecError>;
    fn encode_votes(&self, votes: &BlockVotes) -> Result<Vec<u8>, CodecError>;
    fn decode_votes(&self, bytes: &[u8]) -> Result<BlockVotes, CodecError>;
    fn encode_propose(&self, propose: &BlockPropose) -> Result<Vec<u8>, CodecError>;
    fn decode_propose(&self, bytes: &[u8]) -> Result<BlockPropose, CodecError>;
    fn encode_transaction(&self, transaction: &Transaction) -> Result<Vec<u8>, CodecError>;
    fn decode_transaction(&self, bytes: &[u8]) -> Result<Transaction, CodecError>;
}

/// HTTP verb of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

impl RequestMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A fully resolved request, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub method: RequestMethod,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub payload: Option<Value>,
}

/// What came back, whatever the status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Header names lower-cased.
    pub headers: HashMap<String, String>,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl RawResponse {
    pub fn protocol_headers(&self) -> HeaderSet {
        HeaderSet::from_pairs(self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// One HTTP round trip. Transport-level failures (timeouts, refused
/// connections) are errors; any HTTP status is a response.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse, RequestFailure>;
}

/// Wall clock.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_millis(&self) -> u64;
}
