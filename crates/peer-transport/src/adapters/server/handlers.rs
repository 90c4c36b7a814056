//! `/peer` endpoint handlers.
//!
//! Bodies are taken as raw bytes and parsed leniently: a body that is not
//! JSON is treated as `null` and fails the endpoint's own schema check.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;
use serde_json::{json, Value};
use shared_types::{ChainMessage, ChainRequest};
use std::collections::HashMap;

use crate::domain::TransportError;
use crate::service::{MessageOutcome, PeerTransport, RemotePeer};

type Params = Query<HashMap<String, String>>;

fn json_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

fn origin(remote: Option<Extension<RemotePeer>>) -> RemotePeer {
    remote.map(|Extension(remote)| remote).unwrap_or_default()
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

fn parse_u64(params: &HashMap<String, String>, name: &str) -> Result<u64, TransportError> {
    let raw = params
        .get(name)
        .ok_or_else(|| TransportError::InvalidQuery(format!("Missing required property: {name}")))?;
    raw.trim()
        .parse()
        .map_err(|_| TransportError::InvalidQuery(format!("Expected integer for {name}")))
}

pub async fn list_peers(State(transport): State<PeerTransport>) -> Json<Value> {
    Json(json!({ "peers": transport.list_peers().await }))
}

pub async fn common_block(
    State(transport): State<PeerTransport>,
    Query(params): Params,
) -> Result<Json<Value>, TransportError> {
    let max = parse_u64(&params, "max")?;
    let min = parse_u64(&params, "min")?;
    let ids: Vec<String> = params
        .get("ids")
        .ok_or_else(|| TransportError::InvalidQuery("Missing required property: ids".into()))?
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(TransportError::InvalidQuery("ids must not be empty".into()));
    }

    let common = transport.common_block(&ids, min, max).await?;
    Ok(Json(json!({ "success": true, "common": common })))
}

pub async fn blocks_since(
    State(transport): State<PeerTransport>,
    Query(params): Params,
) -> Json<Value> {
    let limit = params.get("limit").and_then(|l| l.trim().parse().ok());
    let blocks = transport
        .blocks_since(params.get("lastBlockId").map(String::as_str), limit)
        .await;
    Json(json!({ "blocks": blocks }))
}

pub async fn receive_block(
    State(transport): State<PeerTransport>,
    remote: Option<Extension<RemotePeer>>,
    body: Bytes,
) -> StatusCode {
    transport.receive_block(&json_body(&body), &origin(remote)).await;
    StatusCode::OK
}

pub async fn receive_votes(
    State(transport): State<PeerTransport>,
    body: Bytes,
) -> Result<Json<Value>, TransportError> {
    transport.receive_votes(&json_body(&body)).await?;
    Ok(success())
}

pub async fn receive_propose(
    State(transport): State<PeerTransport>,
    body: Bytes,
) -> Result<Json<Value>, TransportError> {
    transport.receive_propose(&json_body(&body)).await?;
    Ok(success())
}

pub async fn list_signatures(State(transport): State<PeerTransport>) -> Json<Value> {
    Json(json!({
        "success": true,
        "signatures": transport.pending_signatures().await,
    }))
}

pub async fn receive_signature(
    State(transport): State<PeerTransport>,
    body: Bytes,
) -> Result<Json<Value>, TransportError> {
    transport.receive_signature(&json_body(&body)).await?;
    Ok(success())
}

pub async fn list_transactions(State(transport): State<PeerTransport>) -> Json<Value> {
    Json(json!({ "transactions": transport.unconfirmed_transactions().await }))
}

pub async fn submit_transaction(
    State(transport): State<PeerTransport>,
    remote: Option<Extension<RemotePeer>>,
    body: Bytes,
) -> Result<Json<Value>, TransportError> {
    let id = transport
        .submit_transaction(&json_body(&body), &origin(remote))
        .await?;
    Ok(Json(json!({ "success": true, "transactionId": id })))
}

pub async fn height(State(transport): State<PeerTransport>) -> Result<Json<Value>, TransportError> {
    Ok(Json(json!({ "height": transport.height().await? })))
}

pub async fn chain_message(State(transport): State<PeerTransport>, body: Bytes) -> Response {
    let message: ChainMessage = match serde_json::from_value(json_body(&body)) {
        Ok(message) => message,
        Err(_) => return TransportError::SchemaValidation.into_response(),
    };
    match transport.receive_chain_message(message).await {
        Ok(MessageOutcome::Delivered(answer)) => Json(answer).into_response(),
        Ok(MessageOutcome::Duplicate) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn chain_request(
    State(transport): State<PeerTransport>,
    body: Bytes,
) -> Result<Json<Value>, TransportError> {
    let request: ChainRequest =
        serde_json::from_value(json_body(&body)).map_err(|_| TransportError::SchemaValidation)?;
    Ok(Json(transport.receive_chain_request(request).await?))
}

pub async fn chain_ready(
    State(transport): State<PeerTransport>,
    body: Bytes,
) -> Result<StatusCode, TransportError> {
    transport.chain_ready(&json_body(&body)).await?;
    Ok(StatusCode::OK)
}

pub async fn endpoint_not_found() -> TransportError {
    TransportError::EndpointNotFound
}
