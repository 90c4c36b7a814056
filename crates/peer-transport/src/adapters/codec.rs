//! Bincode implementation of the binary gossip encoding.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Block, BlockPropose, BlockVotes, Transaction};

use crate::domain::CodecError;
use crate::ports::BinaryCodec;

#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError(e.to_string()))
}

impl BinaryCodec for BincodeCodec {
    fn encode_block(&self, block: &Block) -> Result<Vec<u8>, CodecError> {
        encode(block)
    }

    fn decode_block(&self, bytes: &[u8]) -> Result<Block, CodecError> {
        decode(bytes)
    }

    fn encode_votes(&self, votes: &BlockVotes) -> Result<Vec<u8>, CodecError> {
        encode(votes)
    }

    fn decode_votes(&self, bytes: &[u8]) -> Result<BlockVotes, CodecError> {
        decode(bytes)
    }

    fn encode_propose(&self, propose: &BlockPropose) -> Result<Vec<u8>, CodecError> {
        encode(propose)
    }

    fn decode_propose(&self, bytes: &[u8]) -> Result<BlockPropose, CodecError> {
        decode(bytes)
    }

    fn encode_transaction(&self, transaction: &Transaction) -> Result<Vec<u8>, CodecError> {
        encode(transaction)
    }

    fn decode_transaction(&self, bytes: &[u8]) -> Result<Transaction, CodecError> {
        decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_roundtrip() {
        let tx = Transaction {
            id: "t1".into(),
            kind: 3,
            timestamp: 99,
            sender_public_key: "aa".repeat(32),
            args: vec!["1".into(), "x".into()],
            height: Some(7),
            ..Default::default()
        };
        let codec = BincodeCodec;
        let decoded = codec
            .decode_transaction(&codec.encode_transaction(&tx).unwrap())
            .unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_truncated_input() {
        let codec = BincodeCodec;
        let bytes = codec.encode_votes(&BlockVotes::default()).unwrap();
        assert!(codec.decode_votes(&bytes[..bytes.len() - 1]).is_err());
    }
}
