//! # Core Domain Entities
//!
//! Blocks, transactions and the consensus artifacts gossiped between
//! delegates.
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `Transaction`
//! - **Consensus**: `BlockVotes`, `VoteSignature`, `BlockPropose`
//! - **Multisignature**: `SignatureShare`

use serde::{Deserialize, Serialize};

use crate::errors::{check_hex, check_id, TypeError};
use crate::{MAX_ID_LENGTH, MAX_VOTE_SIGNATURES};

/// Size of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_BYTES: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_BYTES: usize = 64;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A block as exchanged between peers.
///
/// `transactions` is only populated when blocks are served together with
/// their transactions (`GET /peer/blocks`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub height: u64,
    /// Seconds since the chain epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub previous_block: Option<String>,
    pub generator_public_key: String,
    #[serde(default)]
    pub payload_hash: String,
    #[serde(default)]
    pub payload_length: u32,
    pub block_signature: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub fees: u64,
    #[serde(default)]
    pub reward: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Structural well-formedness check.
    pub fn validate(&self) -> Result<(), TypeError> {
        check_id("id", &self.id, MAX_ID_LENGTH)?;
        check_hex(
            "generatorPublicKey",
            &self.generator_public_key,
            Some(PUBLIC_KEY_BYTES),
        )?;
        check_hex("blockSignature", &self.block_signature, Some(SIGNATURE_BYTES))?;
        if !self.payload_hash.is_empty() {
            check_hex("payloadHash", &self.payload_hash, None)?;
        }
        for (index, tx) in self.transactions.iter().enumerate() {
            tx.validate().map_err(|e| TypeError::Nested {
                entity: "transaction",
                index,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

/// A transaction as exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u32,
    pub timestamp: u64,
    pub sender_public_key: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub fee: u64,
    /// Contract call arguments, each already string-encoded by the client.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Signatures collected so far (one for plain transfers, many for
    /// multisignature accounts).
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub second_signature: Option<String>,
    /// Height of the including block; `None` while unconfirmed.
    #[serde(default)]
    pub height: Option<u64>,
}

impl Transaction {
    /// Structural well-formedness check.
    pub fn validate(&self) -> Result<(), TypeError> {
        check_id("id", &self.id, MAX_ID_LENGTH)?;
        check_hex(
            "senderPublicKey",
            &self.sender_public_key,
            Some(PUBLIC_KEY_BYTES),
        )?;
        for signature in &self.signatures {
            check_hex("signatures", signature, Some(SIGNATURE_BYTES))?;
        }
        if let Some(second) = &self.second_signature {
            check_hex("secondSignature", second, Some(SIGNATURE_BYTES))?;
        }
        Ok(())
    }
}

// =============================================================================
// CLUSTER B: CONSENSUS
// =============================================================================

/// A single delegate vote on a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSignature {
    pub public_key: String,
    pub signature: String,
}

/// The vote set collected for a block at a given height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BlockVotes {
    pub height: u64,
    pub id: String,
    pub signatures: Vec<VoteSignature>,
}

impl BlockVotes {
    /// `height >= 1`, `id` at most 64 chars, 1 to 101 signatures.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.height < 1 {
            return Err(TypeError::BelowMinimum {
                field: "height",
                min: 1,
            });
        }
        check_id("id", &self.id, MAX_ID_LENGTH)?;
        let count = self.signatures.len();
        if count == 0 || count > MAX_VOTE_SIGNATURES {
            return Err(TypeError::InvalidCount {
                field: "signatures",
                actual: count,
                min: 1,
                max: MAX_VOTE_SIGNATURES,
            });
        }
        Ok(())
    }
}

/// A block proposal announced by the slot's bookkeeper before voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BlockPropose {
    pub height: u64,
    pub id: String,
    pub timestamp: u64,
    pub generator_public_key: String,
    pub address: String,
    pub hash: String,
    pub signature: String,
}

impl BlockPropose {
    /// Structural well-formedness check of the proposal envelope.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.height < 1 {
            return Err(TypeError::BelowMinimum {
                field: "height",
                min: 1,
            });
        }
        check_id("id", &self.id, MAX_ID_LENGTH)?;
        check_hex(
            "generatorPublicKey",
            &self.generator_public_key,
            Some(PUBLIC_KEY_BYTES),
        )?;
        if self.address.is_empty() {
            return Err(TypeError::EmptyField("address"));
        }
        check_hex("hash", &self.hash, None)?;
        check_hex("signature", &self.signature, Some(SIGNATURE_BYTES))?;
        Ok(())
    }
}

// =============================================================================
// CLUSTER C: MULTISIGNATURE
// =============================================================================

/// One co-signer's signature for a pending multisignature transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureShare {
    pub transaction: String,
    pub signature: String,
}

impl SignatureShare {
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.transaction.is_empty() {
            return Err(TypeError::EmptyField("transaction"));
        }
        check_hex("signature", &self.signature, Some(SIGNATURE_BYTES))
    }
}
