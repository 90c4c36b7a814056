//! # Chain Relay
//!
//! Bridge traffic between side chains. Every envelope carries a timestamp
//! and a hashsum of its body; envelopes whose sum does not match are
//! refused. One-way messages are delivered at most once per hash.

use serde_json::{json, Map, Value};
use shared_bus::TransportEvent;
use shared_types::{ChainMessage, ChainRequest, ChainRequestBody};
use tracing::debug;

use super::PeerTransport;
use crate::domain::{hashsum, OutboundError, Peer, PeerSelector, RegistryError, TransportError};
use crate::ports::{BroadcastReport, PeerReply, RequestSpec};

/// Result of delivering a bridge message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// The hash was seen before; nothing was delivered.
    Duplicate,
    /// The side chain's answer, with `success: true` merged in.
    Delivered(Value),
}

/// Check an envelope's chain and hashsum. Returns `(chain, hash)`.
fn verify_envelope(
    chain: Option<&str>,
    body: &Value,
    timestamp: Option<u64>,
    hash: Option<&str>,
) -> Result<(String, String), TransportError> {
    let chain = chain
        .filter(|c| !c.is_empty())
        .ok_or(TransportError::MissedChain)?;
    let (Some(timestamp), Some(hash)) = (timestamp.filter(|t| *t != 0), hash.filter(|h| !h.is_empty()))
    else {
        return Err(TransportError::MissedHashSum);
    };
    if hashsum(body, timestamp) != hash {
        return Err(TransportError::WrongHashSum);
    }
    Ok((chain.to_string(), hash.to_string()))
}

/// The `error` a side chain reported in its answer, if any.
fn reported_error(answer: &Value) -> Option<String> {
    match answer.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Non-object answers are wrapped under `body`.
fn into_object(answer: Value) -> Map<String, Value> {
    match answer {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("body".into(), other);
            map
        }
    }
}

/// Message answers always report success.
fn with_success(answer: Value) -> Value {
    let mut map = into_object(answer);
    map.insert("success".into(), Value::Bool(true));
    Value::Object(map)
}

/// Request answers keep any `success` the side chain set itself.
fn success_by_default(answer: Value) -> Value {
    let mut map = into_object(answer);
    map.entry("success").or_insert(Value::Bool(true));
    Value::Object(map)
}

impl PeerTransport {
    /// Deliver an inbound bridge message to its side chain.
    ///
    /// The hash is recorded before delivery, so a message that fails
    /// downstream is still never delivered twice.
    pub async fn receive_chain_message(
        &self,
        message: ChainMessage,
    ) -> Result<MessageOutcome, TransportError> {
        let (chain, hash) = verify_envelope(
            message.chain.as_deref(),
            &message.body,
            message.timestamp,
            message.hash.as_deref(),
        )?;
        if !self.inner.messages.mark_seen(&hash) {
            debug!(%chain, %hash, "Duplicate bridge message");
            return Ok(MessageOutcome::Duplicate);
        }

        let answer = self
            .deps()
            .relay
            .message(&chain, message.body.clone())
            .await
            .map_err(|e| TransportError::Downstream(e.to_string()))?;
        if let Some(error) = reported_error(&answer) {
            return Err(TransportError::Downstream(error));
        }

        self.deps()
            .bus
            .publish(TransportEvent::Message {
                message,
                broadcast: true,
            })
            .await;
        Ok(MessageOutcome::Delivered(with_success(answer)))
    }

    /// Route an inbound bridge request to its side chain and answer with
    /// the side chain's reply.
    pub async fn receive_chain_request(&self, request: ChainRequest) -> Result<Value, TransportError> {
        let (chain, _hash) = verify_envelope(
            request.chain.as_deref(),
            &request.body,
            request.timestamp,
            request.hash.as_deref(),
        )?;
        let routed =
            ChainRequestBody::from_body(&request.body).ok_or(TransportError::SchemaValidation)?;

        let answer = self
            .deps()
            .relay
            .request(&chain, &routed.method, &routed.path, routed.query)
            .await
            .map_err(|e| TransportError::Downstream(e.to_string()))?;
        if let Some(error) = reported_error(&answer) {
            return Err(TransportError::Downstream(error));
        }
        Ok(success_by_default(answer))
    }

    /// Stamp `body` for `chain` and broadcast it to that chain's peers.
    pub async fn relay_message(&self, chain: &str, body: Value) -> Result<BroadcastReport, RegistryError> {
        let envelope = self.stamp(chain, body);
        self.broadcast(
            PeerSelector::for_chain(0, chain),
            RequestSpec::post("/chain/message", envelope),
        )
        .await
    }

    /// Stamp `body` for `chain` and send it to the peer it names, or to a
    /// random peer of that chain.
    pub async fn relay_request(&self, chain: &str, body: Value) -> Result<PeerReply, OutboundError> {
        let target = ChainRequestBody::from_body(&body).and_then(|routed| routed.peer);
        let spec = RequestSpec::post("/chain/request", self.stamp(chain, body));
        match target {
            Some(address) => Ok(self.get_from_peer(&Peer::with_address(address), spec).await?),
            None => {
                self.get_from_random_peer(PeerSelector::for_chain(1, chain), spec)
                    .await
            }
        }
    }

    fn stamp(&self, chain: &str, body: Value) -> Value {
        let timestamp = self.deps().clock.now_millis();
        let hash = hashsum(&body, timestamp);
        debug!(%chain, %hash, "Stamped bridge envelope");
        json!({
            "chain": chain,
            "body": body,
            "timestamp": timestamp,
            "hash": hash,
        })
    }
}
