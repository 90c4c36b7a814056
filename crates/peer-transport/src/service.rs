//! # Peer Transport Service
//!
//! `PeerTransport` owns the transport state (readiness flag, replay guards,
//! the admission sequence) and the injected collaborators. It is cheap to
//! clone: every clone shares one `Arc`'d core, which is what the HTTP
//! handlers and the broadcast tasks hold on to.
//!
//! The operations are split by concern:
//!
//! - [`handshake`]: inbound header guard and peer registration
//! - [`outbound`]: single-peer requests and reputation feedback
//! - [`broadcast`]: bounded fan-out to a peer sample
//! - [`admission`]: transaction freshness, replay and serialization
//! - [`gossip`]: inbound block, vote, proposal and signature pushes
//! - [`sync`]: read endpoints (peers, blocks, height, pools)
//! - [`relay`]: side-chain message and request bridging
//! - [`forwarder`]: event bus to broadcast wiring

pub mod admission;
pub mod broadcast;
pub mod forwarder;
pub mod gossip;
pub mod handshake;
pub mod outbound;
pub mod relay;
pub mod sync;

use async_trait::async_trait;
use serde_json::Value;
use shared_bus::EventPublisher;
use shared_types::BlockVotes;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::domain::{
    AntiReplayCache, ConfigError, MessageDedupSet, OutboundError, Peer, PeerRequestError,
    PeerSelector, ProtocolHeaders, RegistryError, SlotClock, TransportConfig,
};
use crate::ports::{
    BinaryCodec, BroadcastReport, ChainRelay, ChainStore, HttpExchange, Mempool,
    Multisignatures, PeerRegistry, PeerReply, PeerTransportApi, RequestSpec, SyncStatus,
    TimeSource,
};

pub use handshake::RemotePeer;
pub use relay::MessageOutcome;
pub use sync::PendingSignatures;

/// Everything the transport needs from the host node.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn PeerRegistry>,
    pub mempool: Arc<dyn Mempool>,
    pub chain: Arc<dyn ChainStore>,
    pub sync: Arc<dyn SyncStatus>,
    pub multisig: Arc<dyn Multisignatures>,
    pub relay: Arc<dyn ChainRelay>,
    pub codec: Arc<dyn BinaryCodec>,
    pub http: Arc<dyn HttpExchange>,
    pub clock: Arc<dyn TimeSource>,
    pub bus: Arc<dyn EventPublisher>,
}

struct Inner {
    config: TransportConfig,
    headers: ProtocolHeaders,
    deps: Collaborators,
    slots: SlotClock,
    loaded: AtomicBool,
    /// Ids of transactions that failed admission.
    rejected: AntiReplayCache,
    /// Hashes of bridge messages already delivered.
    messages: MessageDedupSet,
    /// One transaction admission at a time.
    admission: tokio::sync::Mutex<()>,
}

/// The peer transport.
#[derive(Clone)]
pub struct PeerTransport {
    inner: Arc<Inner>,
}

impl PeerTransport {
    /// Validate `config` and assemble a transport. It starts not ready.
    pub fn new(config: TransportConfig, deps: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.admission.invalid_cache_capacity).ok_or_else(
            || ConfigError::InvalidLimit("admission.invalid_cache_capacity must be > 0".into()),
        )?;
        let headers = config.protocol_headers();
        let slots = SlotClock::new(&config.slots);
        Ok(Self {
            inner: Arc::new(Inner {
                headers,
                deps,
                slots,
                loaded: AtomicBool::new(false),
                rejected: AntiReplayCache::new(capacity),
                messages: MessageDedupSet::new(),
                admission: tokio::sync::Mutex::new(()),
                config,
            }),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Headers stamped on every request and response.
    pub fn headers(&self) -> &ProtocolHeaders {
        &self.inner.headers
    }

    pub(crate) fn deps(&self) -> &Collaborators {
        &self.inner.deps
    }

    /// Called once the blockchain has finished loading.
    pub fn mark_ready(&self) {
        info!("Peer transport ready");
        self.inner.loaded.store(true, Ordering::SeqCst);
    }

    /// Stop serving peer requests. Part of node shutdown.
    pub fn cleanup(&self) {
        info!("Peer transport cleanup");
        self.inner.loaded.store(false, Ordering::SeqCst);
    }

    /// Loaded and not syncing.
    pub fn is_ready(&self) -> bool {
        self.inner.loaded.load(Ordering::SeqCst) && !self.inner.deps.sync.is_syncing()
    }

    /// The `/peer` HTTP surface.
    pub fn router(&self) -> axum::Router {
        crate::adapters::server::router(self.clone())
    }

    /// Serve the HTTP surface on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        crate::adapters::server::serve(self.clone(), listener, shutdown).await
    }
}

#[async_trait]
impl PeerTransportApi for PeerTransport {
    async fn broadcast(
        &self,
        selector: PeerSelector,
        spec: RequestSpec,
    ) -> Result<BroadcastReport, RegistryError> {
        PeerTransport::broadcast(self, selector, spec).await
    }

    async fn get_from_peer(
        &self,
        peer: &Peer,
        spec: RequestSpec,
    ) -> Result<PeerReply, PeerRequestError> {
        PeerTransport::get_from_peer(self, peer, spec).await
    }

    async fn get_from_random_peer(
        &self,
        selector: PeerSelector,
        spec: RequestSpec,
    ) -> Result<PeerReply, OutboundError> {
        PeerTransport::get_from_random_peer(self, selector, spec).await
    }

    async fn send_votes(&self, votes: &BlockVotes, address: &str) {
        PeerTransport::send_votes(self, votes, address).await;
    }

    async fn relay_message(
        &self,
        chain: &str,
        body: Value,
    ) -> Result<BroadcastReport, RegistryError> {
        PeerTransport::relay_message(self, chain, body).await
    }

    async fn relay_request(&self, chain: &str, body: Value) -> Result<PeerReply, OutboundError> {
        PeerTransport::relay_request(self, chain, body).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::memory::MemoryBackend;

    pub(crate) fn transport() -> (PeerTransport, MemoryBackend) {
        let backend = MemoryBackend::new();
        let transport = PeerTransport::new(TransportConfig::default(), backend.collaborators())
            .expect("default config is valid");
        transport.mark_ready();
        (transport, backend)
    }

    #[test]
    fn test_readiness_follows_load_and_sync() {
        let backend = MemoryBackend::new();
        let transport =
            PeerTransport::new(TransportConfig::default(), backend.collaborators()).unwrap();
        assert!(!transport.is_ready());

        transport.mark_ready();
        assert!(transport.is_ready());

        backend.sync.set_syncing(true);
        assert!(!transport.is_ready());
        backend.sync.set_syncing(false);

        transport.cleanup();
        assert!(!transport.is_ready());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let backend = MemoryBackend::new();
        let mut config = TransportConfig::default();
        config.peers.broadcast_concurrency = 0;
        assert!(PeerTransport::new(config, backend.collaborators()).is_err());
    }
}
