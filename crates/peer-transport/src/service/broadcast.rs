//! Bounded fan-out of one request to a sample of peers.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, Instrument};

use super::PeerTransport;
use crate::domain::{PeerSelector, RegistryError};
use crate::ports::{BroadcastReport, RequestSpec};

impl PeerTransport {
    /// Send `spec` to up to `peers.broadcast_limit` peers matching `selector`,
    /// at most `peers.broadcast_concurrency` in flight at once.
    ///
    /// Returns as soon as every send is dispatched. Individual failures are
    /// logged and fed back to the registry by [`Self::get_from_peer`]; they
    /// never fail the broadcast.
    pub async fn broadcast(
        &self,
        mut selector: PeerSelector,
        spec: RequestSpec,
    ) -> Result<BroadcastReport, RegistryError> {
        let limits = &self.config().peers;
        selector.limit = limits.broadcast_limit;
        let peers = self.deps().registry.list(&selector).await?;
        let permits = Arc::new(Semaphore::new(limits.broadcast_concurrency));

        let target = spec.target.path();
        for peer in &peers {
            let transport = self.clone();
            let spec = spec.clone();
            let peer = peer.clone();
            let permits = Arc::clone(&permits);
            let span = tracing::debug_span!("broadcast_send", peer = %peer.label(), %target);
            tokio::spawn(
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    if let Err(e) = transport.get_from_peer(&peer, spec).await {
                        debug!(error = %e, "Broadcast send failed");
                    }
                }
                .instrument(span),
            );
        }

        debug!(%target, dispatched = peers.len(), "Broadcast dispatched");
        Ok(BroadcastReport {
            dispatched: peers.len(),
            peers,
        })
    }
}
