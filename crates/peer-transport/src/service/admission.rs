//! # Transaction Admission
//!
//! Admission of a peer-pushed transaction runs these steps in order:
//!
//! 1. freshness: refuse while the chain tip lags the clock by
//!    `admission.max_slot_lag` slots or more
//! 2. decode and validate (a malformed body bans its origin)
//! 3. replay guard: ids that already failed admission are refused without
//!    touching the mempool
//! 4. under the admission lock: duplicate check, then mempool insert
//!
//! Any failure in step 4 remembers the id in the replay guard.

use serde_json::Value;
use shared_bus::TransportEvent;
use tracing::{error, info, warn};

use super::{PeerTransport, RemotePeer};
use crate::domain::{payload, TransportError};

impl PeerTransport {
    /// Admit a transaction pushed by a peer. Returns the accepted id.
    pub async fn submit_transaction(
        &self,
        body: &Value,
        origin: &RemotePeer,
    ) -> Result<String, TransportError> {
        self.check_freshness().await?;

        let transaction = match payload::decode_transaction(body, self.deps().codec.as_ref()) {
            Ok(transaction) => transaction,
            Err(e) => {
                warn!(peer = %origin.label(), error = %e, "Received transaction is not valid");
                self.ban_origin(origin).await;
                return Err(TransportError::InvalidTransactionBody);
            }
        };

        let id = transaction.id.clone();
        if self.inner.rejected.contains(&id) {
            return Err(TransportError::AlreadyProcessed(id));
        }

        let outcome = {
            let _sequence = self.inner.admission.lock().await;
            let mempool = &self.deps().mempool;
            if mempool.has_unconfirmed(&id).await {
                Err(TransportError::AlreadyExists)
            } else {
                info!(tx_id = %id, peer = %origin.label(), "Received transaction");
                mempool
                    .receive_transaction(transaction)
                    .await
                    .map_err(|e| TransportError::Rejected(e.to_string()))
            }
        };

        match outcome {
            Ok(accepted) => {
                let id = accepted.id.clone();
                self.deps()
                    .bus
                    .publish(TransportEvent::UnconfirmedTransaction {
                        transaction: accepted,
                        broadcast: true,
                    })
                    .await;
                Ok(id)
            }
            Err(e) => {
                warn!(tx_id = %id, error = %e, "Transaction not admitted");
                self.inner.rejected.insert(&id);
                Err(e)
            }
        }
    }

    async fn check_freshness(&self) -> Result<(), TransportError> {
        let last = match self.deps().chain.last_block().await {
            Ok(block) => block,
            Err(e) => {
                error!(error = %e, "Failed to read the chain tip");
                return Err(TransportError::NotReady);
            }
        };
        let now = self.deps().clock.now_millis();
        let slots = &self.inner.slots;
        let lag = slots.lag(last.timestamp, now);
        if lag >= self.config().admission.max_slot_lag {
            error!(
                next_slot = slots.next_slot(now),
                last_slot = slots.slot_number(last.timestamp),
                last_height = last.height,
                "Blockchain is not ready"
            );
            return Err(TransportError::NotReady);
        }
        Ok(())
    }
}
