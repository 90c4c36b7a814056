//! Inbound gossip: blocks, votes, proposals, signatures and chain readiness.

use serde_json::Value;
use shared_bus::TransportEvent;
use shared_types::{ChainReady, SignatureShare};
use tracing::{debug, warn};

use super::{PeerTransport, RemotePeer};
use crate::domain::{payload, TransportError};

impl PeerTransport {
    /// A pushed `{block, votes}`. A payload that fails to decode bans the
    /// origin; the sender is never told either way.
    pub async fn receive_block(&self, body: &Value, origin: &RemotePeer) {
        match payload::decode_block(body, self.deps().codec.as_ref()) {
            Ok((block, votes)) => {
                debug!(height = block.height, id = %block.id, peer = %origin.label(), "Received block");
                self.deps()
                    .bus
                    .publish(TransportEvent::ReceiveBlock { block, votes })
                    .await;
            }
            Err(e) => {
                warn!(peer = %origin.label(), error = %e, "Received block is not valid");
                self.ban_origin(origin).await;
            }
        }
    }

    /// A pushed vote set.
    pub async fn receive_votes(&self, body: &Value) -> Result<(), TransportError> {
        let votes = payload::decode_votes(body).map_err(|e| {
            debug!(error = %e, "Rejected votes");
            TransportError::SchemaValidation
        })?;
        self.deps()
            .bus
            .publish(TransportEvent::ReceiveVotes(votes))
            .await;
        Ok(())
    }

    /// A pushed `{propose}`.
    pub async fn receive_propose(&self, body: &Value) -> Result<(), TransportError> {
        let propose = payload::decode_propose(body, self.deps().codec.as_ref()).map_err(|e| {
            debug!(error = %e, "Rejected proposal");
            TransportError::SchemaValidation
        })?;
        self.deps()
            .bus
            .publish(TransportEvent::ReceivePropose(propose))
            .await;
        Ok(())
    }

    /// A pushed `{signature: {transaction, signature}}`.
    pub async fn receive_signature(&self, body: &Value) -> Result<(), TransportError> {
        let share = body
            .get("signature")
            .cloned()
            .and_then(|value| serde_json::from_value::<SignatureShare>(value).ok())
            .filter(|share| share.validate().is_ok())
            .ok_or(TransportError::Validation)?;

        self.deps()
            .multisig
            .process_signature(share)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to process signature");
                TransportError::ProcessSignature
            })
    }

    /// A dependent chain announcing readiness.
    pub async fn chain_ready(&self, body: &Value) -> Result<String, TransportError> {
        let ready: ChainReady = serde_json::from_value(body.clone())
            .ok()
            .filter(|ready: &ChainReady| ready.validate().is_ok())
            .ok_or(TransportError::SchemaValidation)?;
        debug!(chain = %ready.chain, "Chain ready");
        Ok(ready.chain)
    }
}
