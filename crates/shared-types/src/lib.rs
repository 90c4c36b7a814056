//! # Shared Types Crate
//!
//! Wire entities exchanged between delegate nodes over the peer transport.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate of the workspace uses these types.
//! - **Structural validation only**: `validate()` checks well-formedness
//!   (lengths, hex encodings, counts). Semantic validity (balances, signature
//!   correctness, consensus rules) belongs to the mempool and consensus.
//! - **Codec friendly**: every field is always serialized, so the same types
//!   travel as JSON and through the node's binary codec.

pub mod entities;
pub mod errors;
pub mod relay;

pub use entities::*;
pub use errors::*;
pub use relay::*;

/// Maximum length of a block, transaction or vote-set identifier.
pub const MAX_ID_LENGTH: usize = 64;

/// Maximum number of delegate signatures carried by one vote set.
pub const MAX_VOTE_SIGNATURES: usize = 101;

/// Returns true when `value` is a non-empty, even-length hex string of
/// exactly `bytes` decoded bytes (any length when `bytes` is `None`).
pub fn is_hex(value: &str, bytes: Option<usize>) -> bool {
    if value.is_empty() {
        return false;
    }
    match hex::decode(value) {
        Ok(decoded) => bytes.map_or(true, |n| decoded.len() == n),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_hex() {
        assert!(is_hex("abcd", None));
        assert!(is_hex("abcd", Some(2)));
        assert!(!is_hex("abcd", Some(3)));
        assert!(!is_hex("xyz0", None));
        assert!(!is_hex("", None));
        assert!(!is_hex("abc", None));
    }
}
