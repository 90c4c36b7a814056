//! # Driving Ports (Inbound API)
//!
//! What the rest of the node calls to talk to peers.

use async_trait::async_trait;
use serde_json::Value;
use shared_types::BlockVotes;

use super::outbound::RequestMethod;
use crate::domain::{OutboundError, Peer, PeerRequestError, PeerSelector, RegistryError};

/// Where a request goes on the remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// A peer API path, resolved under `/peer` (e.g. `/blocks`).
    Api(String),
    /// A raw path on the remote host.
    Url(String),
}

impl RequestTarget {
    pub fn path(&self) -> String {
        match self {
            Self::Api(api) => format!("/peer{api}"),
            Self::Url(url) => url.clone(),
        }
    }
}

/// A request to send to one or more peers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub target: RequestTarget,
    pub method: RequestMethod,
    pub payload: Option<Value>,
    /// Extra headers, merged over the protocol headers.
    pub headers: Vec<(String, String)>,
    /// When false a failing peer is never banned (it may still be removed
    /// when unreachable).
    pub allow_ban: bool,
}

impl RequestSpec {
    pub fn get(api: impl Into<String>) -> Self {
        Self {
            target: RequestTarget::Api(api.into()),
            method: RequestMethod::Get,
            payload: None,
            headers: Vec::new(),
            allow_ban: true,
        }
    }

    pub fn post(api: impl Into<String>, payload: Value) -> Self {
        Self {
            target: RequestTarget::Api(api.into()),
            method: RequestMethod::Post,
            payload: Some(payload),
            headers: Vec::new(),
            allow_ban: true,
        }
    }

    #[must_use]
    pub fn without_ban(mut self) -> Self {
        self.allow_ban = false;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful single-peer exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerReply {
    pub body: Value,
    pub peer: Peer,
}

/// Outcome of a broadcast once every send has been dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastReport {
    pub dispatched: usize,
    pub peers: Vec<Peer>,
}

/// Outbound peer API used by consensus, the bridge and block production.
#[async_trait]
pub trait PeerTransportApi: Send + Sync {
    /// Send to a sample of peers; returns once every send is dispatched.
    async fn broadcast(
        &self,
        selector: PeerSelector,
        spec: RequestSpec,
    ) -> Result<BroadcastReport, RegistryError>;

    /// One request to one peer, with reputation feedback.
    async fn get_from_peer(&self, peer: &Peer, spec: RequestSpec)
        -> Result<PeerReply, PeerRequestError>;

    /// One request to a single randomly selected peer.
    async fn get_from_random_peer(
        &self,
        selector: PeerSelector,
        spec: RequestSpec,
    ) -> Result<PeerReply, OutboundError>;

    /// Push a vote set straight to a delegate at `address`.
    async fn send_votes(&self, votes: &BlockVotes, address: &str);

    /// Stamp and broadcast a bridge message to the peers of `chain`.
    async fn relay_message(&self, chain: &str, body: Value)
        -> Result<BroadcastReport, RegistryError>;

    /// Stamp and send a bridge request, returning the remote's answer.
    async fn relay_request(&self, chain: &str, body: Value) -> Result<PeerReply, OutboundError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_paths() {
        assert_eq!(RequestTarget::Api("/blocks".into()).path(), "/peer/blocks");
        assert_eq!(RequestTarget::Url("/api/x".into()).path(), "/api/x");
    }

    #[test]
    fn test_spec_builders() {
        let spec = RequestSpec::post("/votes", json!({})).without_ban().with_header("x", "1");
        assert_eq!(spec.method, RequestMethod::Post);
        assert!(!spec.allow_ban);
        assert_eq!(spec.headers, vec![("x".to_string(), "1".to_string())]);
        assert!(RequestSpec::get("/height").allow_ban);
    }
}
