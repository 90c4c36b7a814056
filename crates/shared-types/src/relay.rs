//! # Bridge Relay Messages
//!
//! Control messages forwarded between this node and the side chains it
//! cooperates with. Bodies are opaque JSON owned by the side chain; the
//! transport only authenticates them with the relay hashsum.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A one-way bridge message (`POST /peer/chain/message`).
///
/// `timestamp` and `hash` are optional on the wire so that a missing hash sum
/// can be reported as such instead of as a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChainMessage {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
}

/// A request/response call into a side chain (`POST /peer/chain/request`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChainRequest {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
}

/// The routed part of a [`ChainRequest`] body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRequestBody {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: Value,
    /// Explicit target peer (`"ip:port"`); a random peer of the chain is
    /// used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

impl ChainRequestBody {
    /// Extract the routed fields from an opaque request body.
    pub fn from_body(body: &Value) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }
}

/// Readiness beacon of a dependent chain (`POST /peer/chainReady`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReady {
    pub chain: String,
}

impl ChainReady {
    pub fn validate(&self) -> Result<(), crate::TypeError> {
        crate::errors::check_id("chain", &self.chain, crate::MAX_ID_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_missing_hash_parses() {
        let msg: ChainMessage =
            serde_json::from_value(json!({ "chain": "c1", "body": { "a": 1 } })).unwrap();
        assert_eq!(msg.chain.as_deref(), Some("c1"));
        assert!(msg.hash.is_none());
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_request_body_routing() {
        let body = json!({ "method": "get", "path": "/balances", "query": { "a": 1 } });
        let routed = ChainRequestBody::from_body(&body).unwrap();
        assert_eq!(routed.method, "get");
        assert_eq!(routed.path, "/balances");
        assert!(routed.peer.is_none());

        assert!(ChainRequestBody::from_body(&json!({ "path": "/x" })).is_none());
    }

    #[test]
    fn test_chain_ready_validate() {
        assert!(ChainReady { chain: "c".repeat(64) }.validate().is_ok());
        assert!(ChainReady { chain: String::new() }.validate().is_err());
        assert!(ChainReady { chain: "c".repeat(65) }.validate().is_err());
    }
}
