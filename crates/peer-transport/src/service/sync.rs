//! Read endpoints peers use to discover each other and catch up.

use serde::Serialize;
use shared_types::{Block, Transaction};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::PeerTransport;
use crate::domain::{Peer, StoreError, TransportError};

/// Collected co-signatures of one pending multisignature transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSignatures {
    pub transaction: String,
    pub signatures: Vec<String>,
}

impl PeerTransport {
    /// Known peers with their chain tags. Empty when the registry fails.
    pub async fn list_peers(&self) -> Vec<Peer> {
        let limit = self.config().peers.list_limit;
        self.deps()
            .registry
            .list_with_chain(limit)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to list peers");
                Vec::new()
            })
    }

    /// Highest block among `ids` within `min..=max`.
    pub async fn common_block(
        &self,
        ids: &[String],
        min: u64,
        max: u64,
    ) -> Result<Block, TransportError> {
        let blocks = self
            .deps()
            .chain
            .blocks_by_ids(ids, min, max)
            .await
            .map_err(|e| {
                warn!(error = %e, "Common block lookup failed");
                TransportError::CommonBlockLookup
            })?;
        blocks
            .into_iter()
            .max_by_key(|b| b.height)
            .ok_or(TransportError::CommonBlockNotFound)
    }

    /// Blocks after `last_block_id`, each with its confirmed transactions.
    ///
    /// `limit` is capped by `blocks.max_per_request`; zero or absent means
    /// the cap. An unknown id or a store failure yields an empty list.
    pub async fn blocks_since(&self, last_block_id: Option<&str>, limit: Option<usize>) -> Vec<Block> {
        let cap = self.config().blocks.max_per_request;
        let limit = limit.filter(|l| *l > 0).map_or(cap, |l| l.min(cap));
        let Some(id) = last_block_id else {
            return Vec::new();
        };
        match self.load_blocks_since(id, limit).await {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(last_block_id = %id, error = %e, "Failed to load blocks");
                Vec::new()
            }
        }
    }

    async fn load_blocks_since(&self, id: &str, limit: usize) -> Result<Vec<Block>, StoreError> {
        let store = &self.deps().chain;
        let Some(last) = store.block_by_id(id).await? else {
            debug!(last_block_id = %id, "Unknown block requested");
            return Ok(Vec::new());
        };
        let mut blocks = store.blocks_after(last.height, limit).await?;
        let Some(top) = blocks.iter().map(|b| b.height).max() else {
            return Ok(blocks);
        };

        let index: HashMap<u64, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.height, i))
            .collect();
        for transaction in store.transactions_between(last.height, top).await? {
            let slot = transaction.height.and_then(|h| index.get(&h).copied());
            if let Some(block) = slot.and_then(|i| blocks.get_mut(i)) {
                block.transactions.push(transaction);
            }
        }
        Ok(blocks)
    }

    pub async fn height(&self) -> Result<u64, TransportError> {
        Ok(self.deps().chain.last_block().await?.height)
    }

    pub async fn unconfirmed_transactions(&self) -> Vec<Transaction> {
        self.deps().mempool.unconfirmed_list().await
    }

    /// Signatures gathered for pooled multisignature transactions.
    pub async fn pending_signatures(&self) -> Vec<PendingSignatures> {
        self.unconfirmed_transactions()
            .await
            .into_iter()
            .filter(|tx| !tx.signatures.is_empty())
            .map(|tx| PendingSignatures {
                transaction: tx.id,
                signatures: tx.signatures,
            })
            .collect()
    }
}
