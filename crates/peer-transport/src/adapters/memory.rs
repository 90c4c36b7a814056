//! # In-Memory Collaborators
//!
//! Fakes for every outbound port. Used by the crate's own tests and by
//! embedders that want to run a transport without a database.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use shared_bus::{EventPublisher, TransportEvent};
use shared_types::{Block, SignatureShare, Transaction};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

use super::codec::BincodeCodec;
use crate::domain::{
    FailureKind, MempoolError, MultisigError, Peer, PeerSelector, PeerState, RegistryError,
    RelayError, RequestFailure, StoreError,
};
use crate::ports::{
    ChainRelay, ChainStore, HttpExchange, Mempool, Multisignatures, OutboundRequest,
    PeerRegistry, RawResponse, SyncStatus, TimeSource,
};
use crate::service::Collaborators;

// =============================================================================
// PEER REGISTRY
// =============================================================================

/// A reputation action recorded by [`MemoryPeerRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Update(Peer),
    Ban { ip: u32, port: u16, duration: Duration },
    Remove { ip: u32, port: u16 },
    Reset,
}

pub struct MemoryPeerRegistry {
    peers: RwLock<Vec<Peer>>,
    calls: Mutex<Vec<RegistryCall>>,
    min_version: String,
    failing: AtomicBool,
}

impl MemoryPeerRegistry {
    /// Peers running at least `min_version` are compatible.
    pub fn new(min_version: impl Into<String>) -> Self {
        Self {
            peers: RwLock::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            min_version: min_version.into(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, peer: Peer) {
        let mut peers = self.peers.write();
        peers.retain(|p| !(p.ip == peer.ip && p.port == peer.port));
        peers.push(peer);
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.peers.read().clone()
    }

    pub fn get(&self, ip: u32, port: u16) -> Option<Peer> {
        self.peers
            .read()
            .iter()
            .find(|p| p.ip == ip && p.port == port)
            .cloned()
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().clone()
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RegistryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryError("registry unavailable".into()));
        }
        Ok(())
    }
}

impl Default for MemoryPeerRegistry {
    fn default() -> Self {
        Self::new("0.0.0")
    }
}

/// Numeric dotted-version comparison. Any non-numeric segment is `None`.
fn compare_versions(left: &str, right: &str) -> Option<CmpOrdering> {
    let parse = |v: &str| {
        v.split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()
    };
    Some(parse(left)?.cmp(&parse(right)?))
}

#[async_trait]
impl PeerRegistry for MemoryPeerRegistry {
    async fn list(&self, selector: &PeerSelector) -> Result<Vec<Peer>, RegistryError> {
        self.check()?;
        let mut peers: Vec<Peer> = self
            .peers
            .read()
            .iter()
            .filter(|p| !matches!(p.state, PeerState::Banned { .. }))
            .filter(|p| match &selector.chain {
                Some(chain) => p.chain.as_deref() == Some(chain.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        peers.shuffle(&mut rand::thread_rng());
        if selector.limit > 0 {
            peers.truncate(selector.limit);
        }
        Ok(peers)
    }

    async fn list_with_chain(&self, limit: usize) -> Result<Vec<Peer>, RegistryError> {
        self.check()?;
        Ok(self.peers.read().iter().take(limit).cloned().collect())
    }

    async fn update(&self, peer: Peer) -> Result<(), RegistryError> {
        self.check()?;
        self.calls.lock().push(RegistryCall::Update(peer.clone()));
        self.insert(peer);
        Ok(())
    }

    async fn ban(&self, ip: u32, port: u16, duration: Duration) -> Result<(), RegistryError> {
        self.check()?;
        self.calls.lock().push(RegistryCall::Ban { ip, port, duration });
        let until = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(duration)
            .as_secs();
        let mut peers = self.peers.write();
        match peers.iter_mut().find(|p| p.ip == ip && p.port == port) {
            Some(peer) => peer.state = PeerState::Banned { until },
            None => {
                let mut peer = Peer::new(ip, port);
                peer.state = PeerState::Banned { until };
                peers.push(peer);
            }
        }
        Ok(())
    }

    async fn remove(&self, ip: u32, port: u16) -> Result<(), RegistryError> {
        self.check()?;
        self.calls.lock().push(RegistryCall::Remove { ip, port });
        self.peers.write().retain(|p| !(p.ip == ip && p.port == port));
        Ok(())
    }

    async fn reset(&self) -> Result<(), RegistryError> {
        self.calls.lock().push(RegistryCall::Reset);
        Ok(())
    }

    fn is_compatible(&self, version: &str) -> bool {
        matches!(
            compare_versions(version, &self.min_version),
            Some(CmpOrdering::Equal | CmpOrdering::Greater)
        )
    }
}

// =============================================================================
// MEMPOOL
// =============================================================================

#[derive(Default)]
pub struct MemoryMempool {
    pool: Mutex<Vec<Transaction>>,
    rejections: Mutex<HashMap<String, String>>,
    receive_calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the transaction `id` with `reason` when it is received.
    pub fn reject(&self, id: impl Into<String>, reason: impl Into<String>) {
        self.rejections.lock().insert(id.into(), reason.into());
    }

    /// Hold every `receive_transaction` call for `delay` before applying it.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub fn insert(&self, transaction: Transaction) {
        self.pool.lock().push(transaction);
    }
}

#[async_trait]
impl Mempool for MemoryMempool {
    async fn has_unconfirmed(&self, id: &str) -> bool {
        self.pool.lock().iter().any(|tx| tx.id == id)
    }

    async fn receive_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, MempoolError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.rejections.lock().get(&transaction.id) {
            return Err(MempoolError::Rejected(reason.clone()));
        }
        let mut pool = self.pool.lock();
        if pool.iter().any(|tx| tx.id == transaction.id) {
            return Err(MempoolError::Duplicate);
        }
        pool.push(transaction.clone());
        Ok(transaction)
    }

    async fn unconfirmed_list(&self) -> Vec<Transaction> {
        self.pool.lock().clone()
    }
}

// =============================================================================
// CHAIN STORE
// =============================================================================

#[derive(Default)]
pub struct MemoryChainStore {
    blocks: RwLock<Vec<Block>>,
    transactions: RwLock<Vec<Transaction>>,
    failing: AtomicBool,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block; blocks are kept sorted by height.
    pub fn push_block(&self, block: Block) {
        let mut blocks = self.blocks.write();
        blocks.push(block);
        blocks.sort_by_key(|b| b.height);
    }

    /// Store a confirmed transaction (its `height` places it in a block).
    pub fn push_transaction(&self, transaction: Transaction) {
        self.transactions.write().push(transaction);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError("database unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    async fn last_block(&self) -> Result<Block, StoreError> {
        self.check()?;
        self.blocks
            .read()
            .last()
            .cloned()
            .ok_or_else(|| StoreError("empty chain".into()))
    }

    async fn block_by_id(&self, id: &str) -> Result<Option<Block>, StoreError> {
        self.check()?;
        Ok(self.blocks.read().iter().find(|b| b.id == id).cloned())
    }

    async fn blocks_by_ids(
        &self,
        ids: &[String],
        min: u64,
        max: u64,
    ) -> Result<Vec<Block>, StoreError> {
        self.check()?;
        Ok(self
            .blocks
            .read()
            .iter()
            .filter(|b| ids.contains(&b.id) && (min..=max).contains(&b.height))
            .cloned()
            .collect())
    }

    async fn blocks_after(&self, height: u64, limit: usize) -> Result<Vec<Block>, StoreError> {
        self.check()?;
        Ok(self
            .blocks
            .read()
            .iter()
            .filter(|b| b.height > height)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transactions_between(
        &self,
        above: u64,
        up_to: u64,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.check()?;
        Ok(self
            .transactions
            .read()
            .iter()
            .filter(|tx| tx.height.is_some_and(|h| h > above && h <= up_to))
            .cloned()
            .collect())
    }
}

// =============================================================================
// SYNC STATUS / MULTISIG
// =============================================================================

#[derive(Default)]
pub struct MemorySyncStatus {
    syncing: AtomicBool,
}

impl MemorySyncStatus {
    pub fn set_syncing(&self, syncing: bool) {
        self.syncing.store(syncing, Ordering::SeqCst);
    }
}

impl SyncStatus for MemorySyncStatus {
    fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MemoryMultisignatures {
    shares: Mutex<Vec<SignatureShare>>,
    failing: AtomicBool,
}

impl MemoryMultisignatures {
    pub fn shares(&self) -> Vec<SignatureShare> {
        self.shares.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Multisignatures for MemoryMultisignatures {
    async fn process_signature(&self, share: SignatureShare) -> Result<(), MultisigError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MultisigError("Transaction not found".into()));
        }
        self.shares.lock().push(share);
        Ok(())
    }
}

// =============================================================================
// CHAIN RELAY
// =============================================================================

/// A bridge request seen by [`MemoryChainRelay`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedRequest {
    pub chain: String,
    pub method: String,
    pub path: String,
    pub query: Value,
}

pub struct MemoryChainRelay {
    messages: Mutex<Vec<(String, Value)>>,
    requests: Mutex<Vec<RelayedRequest>>,
    reply: Mutex<Result<Value, RelayError>>,
}

impl Default for MemoryChainRelay {
    fn default() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            reply: Mutex::new(Ok(json!({}))),
        }
    }
}

impl MemoryChainRelay {
    /// What every handler call answers with from now on.
    pub fn set_reply(&self, reply: Result<Value, RelayError>) {
        *self.reply.lock() = reply;
    }

    pub fn messages(&self) -> Vec<(String, Value)> {
        self.messages.lock().clone()
    }

    pub fn requests(&self) -> Vec<RelayedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChainRelay for MemoryChainRelay {
    async fn message(&self, chain: &str, body: Value) -> Result<Value, RelayError> {
        self.messages.lock().push((chain.to_string(), body));
        self.reply.lock().clone()
    }

    async fn request(
        &self,
        chain: &str,
        method: &str,
        path: &str,
        query: Value,
    ) -> Result<Value, RelayError> {
        self.requests.lock().push(RelayedRequest {
            chain: chain.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            query,
        });
        self.reply.lock().clone()
    }
}

// =============================================================================
// HTTP EXCHANGE
// =============================================================================

/// How [`ScriptedExchange`] answers a request.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(RawResponse),
    Fail(FailureKind),
}

impl Scripted {
    /// A 200 with `body` and no protocol headers.
    pub fn ok(body: Value) -> Self {
        Self::Reply(RawResponse {
            status: 200,
            headers: HashMap::new(),
            body,
        })
    }

    /// A 200 with `body` and the given response headers.
    pub fn ok_with_headers(body: Value, headers: &[(&str, &str)]) -> Self {
        Self::Reply(RawResponse {
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            body,
        })
    }

    pub fn status(status: u16) -> Self {
        Self::Reply(RawResponse {
            status,
            headers: HashMap::new(),
            body: Value::Null,
        })
    }
}

/// Records every outbound request and answers from a per-host script.
pub struct ScriptedExchange {
    requests: Mutex<Vec<OutboundRequest>>,
    scripts: Mutex<Vec<(String, Scripted)>>,
    fallback: Mutex<Scripted>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    notify: Notify,
}

impl Default for ScriptedExchange {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            fallback: Mutex::new(Scripted::ok(json!({ "success": true }))),
            delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose URL starts with `base_url`.
    pub fn script(&self, base_url: impl Into<String>, answer: Scripted) {
        self.scripts.lock().push((base_url.into(), answer));
    }

    /// Answer for requests no script matches.
    pub fn set_fallback(&self, answer: Scripted) {
        *self.fallback.lock() = answer;
    }

    /// Hold every request for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once at least `count` requests have been recorded.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.requests.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn answer_for(&self, url: &str) -> Scripted {
        self.scripts
            .lock()
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, answer)| answer.clone())
            .unwrap_or_else(|| self.fallback.lock().clone())
    }
}

#[async_trait]
impl HttpExchange for ScriptedExchange {
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse, RequestFailure> {
        let answer = self.answer_for(&request.url);
        self.requests.lock().push(request);
        self.notify.notify_waiters();

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match answer {
            Scripted::Reply(response) => Ok(response),
            Scripted::Fail(kind) => Err(RequestFailure::new(kind, format!("scripted {kind:?}"))),
        }
    }
}

// =============================================================================
// CLOCK / EVENTS
// =============================================================================

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(by, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Publisher that keeps every event for later inspection.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<TransportEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: TransportEvent) -> usize {
        self.events.lock().push(event);
        1
    }

    fn events_published(&self) -> u64 {
        self.events.lock().len() as u64
    }
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Wall-clock time the in-memory backend starts at.
pub const MEMORY_NOW_MILLIS: u64 = 1_700_000_000_000;

/// A full set of in-memory collaborators.
///
/// The chain starts with one block stamped in the current slot so the
/// transport accepts transactions straight away under default slot settings.
pub struct MemoryBackend {
    pub registry: Arc<MemoryPeerRegistry>,
    pub mempool: Arc<MemoryMempool>,
    pub chain: Arc<MemoryChainStore>,
    pub sync: Arc<MemorySyncStatus>,
    pub multisig: Arc<MemoryMultisignatures>,
    pub relay: Arc<MemoryChainRelay>,
    pub http: Arc<ScriptedExchange>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingPublisher>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let slots = crate::domain::SlotConfig::default();
        let chain = MemoryChainStore::new();
        chain.push_block(Block {
            id: "1".into(),
            height: 1,
            timestamp: (MEMORY_NOW_MILLIS / 1000).saturating_sub(slots.epoch_unix_secs),
            ..Default::default()
        });
        Self {
            registry: Arc::new(MemoryPeerRegistry::default()),
            mempool: Arc::new(MemoryMempool::new()),
            chain: Arc::new(chain),
            sync: Arc::new(MemorySyncStatus::default()),
            multisig: Arc::new(MemoryMultisignatures::default()),
            relay: Arc::new(MemoryChainRelay::default()),
            http: Arc::new(ScriptedExchange::new()),
            clock: Arc::new(ManualClock::new(MEMORY_NOW_MILLIS)),
            events: Arc::new(RecordingPublisher::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            registry: self.registry.clone(),
            mempool: self.mempool.clone(),
            chain: self.chain.clone(),
            sync: self.sync.clone(),
            multisig: self.multisig.clone(),
            relay: self.relay.clone(),
            codec: Arc::new(BincodeCodec),
            http: self.http.clone(),
            clock: self.clock.clone(),
            bus: self.events.clone(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
