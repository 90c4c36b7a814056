//! Decoding of gossip payloads.
//!
//! Blocks, votes, proposals and transactions arrive either as JSON objects
//! or as base64 strings in the node's binary encoding. Either way the result
//! must pass structural validation before it is used.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_types::{Block, BlockPropose, BlockVotes, Transaction};

use super::errors::{CodecError, PayloadError};
use crate::ports::BinaryCodec;

/// Decode a field that is either a JSON object or base64 binary.
fn decode_field<T, F>(
    body: &Value,
    field: &'static str,
    from_binary: F,
) -> Result<T, PayloadError>
where
    T: DeserializeOwned,
    F: FnOnce(&[u8]) -> Result<T, CodecError>,
{
    match body.get(field) {
        None | Some(Value::Null) => Err(PayloadError::Missing(field)),
        Some(Value::String(encoded)) => {
            let bytes = STANDARD
                .decode(encoded.trim())
                .map_err(|_| PayloadError::Base64(field))?;
            Ok(from_binary(&bytes)?)
        }
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| PayloadError::Json {
            field,
            reason: e.to_string(),
        }),
    }
}

/// `{block, votes}` as pushed by `POST /peer/blocks`.
pub fn decode_block(body: &Value, codec: &dyn BinaryCodec) -> Result<(Block, BlockVotes), PayloadError> {
    let block: Block = decode_field(body, "block", |b| codec.decode_block(b))?;
    let votes: BlockVotes = decode_field(body, "votes", |b| codec.decode_votes(b))?;
    block.validate()?;
    votes.validate()?;
    Ok((block, votes))
}

/// `{propose}` as pushed by `POST /peer/propose`.
pub fn decode_propose(body: &Value, codec: &dyn BinaryCodec) -> Result<BlockPropose, PayloadError> {
    let propose: BlockPropose = decode_field(body, "propose", |b| codec.decode_propose(b))?;
    propose.validate()?;
    Ok(propose)
}

/// `{transaction}` as pushed by `POST /peer/transactions`.
pub fn decode_transaction(
    body: &Value,
    codec: &dyn BinaryCodec,
) -> Result<Transaction, PayloadError> {
    let transaction: Transaction =
        decode_field(body, "transaction", |b| codec.decode_transaction(b))?;
    transaction.validate()?;
    Ok(transaction)
}

/// A vote set pushed as the whole request body (`POST /peer/votes`).
pub fn decode_votes(body: &Value) -> Result<BlockVotes, PayloadError> {
    let votes: BlockVotes = serde_json::from_value(body.clone()).map_err(|e| PayloadError::Json {
        field: "votes",
        reason: e.to_string(),
    })?;
    votes.validate()?;
    Ok(votes)
}

/// Base64 form of a proposal, for outgoing gossip.
pub fn encode_propose(propose: &BlockPropose, codec: &dyn BinaryCodec) -> Result<String, CodecError> {
    codec.encode_propose(propose).map(|bytes| STANDARD.encode(bytes))
}
