//! Event bus to peer broadcast wiring.
//!
//! Local components publish events flagged `broadcast: true`; the forwarder
//! turns each into the matching peer push.

use serde_json::json;
use shared_bus::{EventFilter, InMemoryEventBus, TransportEvent};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::PeerTransport;
use crate::domain::{payload, PeerSelector};
use crate::ports::{BroadcastReport, RequestSpec};

impl PeerTransport {
    /// Subscribe to `bus` and gossip every outbound event until the bus
    /// closes.
    pub fn spawn_event_forwarder(&self, bus: &InMemoryEventBus) -> JoinHandle<()> {
        let mut subscription = bus.subscribe(EventFilter::outbound());
        let transport = self.clone();
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                transport.forward_event(event).await;
            }
            debug!("Event bus closed, forwarder stopped");
        })
    }

    /// Broadcast one event to peers. `None` when the event is not meant for
    /// peers or could not be sent.
    pub async fn forward_event(&self, event: TransportEvent) -> Option<BroadcastReport> {
        if !event.wants_broadcast() {
            return None;
        }
        let topic = event.topic();
        let (selector, spec) = match event {
            TransportEvent::Signature { signature, .. } => (
                PeerSelector::default(),
                RequestSpec::post("/signatures", json!({ "signature": signature })),
            ),
            TransportEvent::UnconfirmedTransaction { transaction, .. } => (
                PeerSelector::default(),
                RequestSpec::post("/transactions", json!({ "transaction": transaction })),
            ),
            TransportEvent::NewBlock { block, votes, .. } => (
                PeerSelector::default(),
                RequestSpec::post("/blocks", json!({ "block": block, "votes": votes })),
            ),
            TransportEvent::NewPropose { propose, .. } => {
                let encoded = match payload::encode_propose(&propose, self.deps().codec.as_ref()) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode proposal");
                        return None;
                    }
                };
                (
                    PeerSelector::default(),
                    RequestSpec::post("/propose", json!({ "propose": encoded })),
                )
            }
            TransportEvent::ChainReady { chain, .. } => (
                PeerSelector::default(),
                RequestSpec::post("/chainReady", json!({ "chain": chain })),
            ),
            TransportEvent::Message { message, .. } => {
                let Some(chain) = message.chain.clone() else {
                    warn!("Bridge message without chain, not forwarded");
                    return None;
                };
                (
                    PeerSelector::for_chain(0, chain),
                    RequestSpec::post("/chain/message", json!(message)),
                )
            }
            TransportEvent::ReceiveBlock { .. }
            | TransportEvent::ReceiveVotes(_)
            | TransportEvent::ReceivePropose(_) => return None,
        };

        match self.broadcast(selector, spec).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(?topic, error = %e, "Failed to broadcast event");
                None
            }
        }
    }
}
