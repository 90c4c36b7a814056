//! # Peer HTTP Surface
//!
//! Axum router for the `/peer` endpoints and the server loop around it.

pub mod handlers;
pub mod middleware;
pub mod response;

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::service::PeerTransport;
use middleware::{HandshakeLayer, PeerSpanLayer, ProtocolHeadersLayer, ReadinessLayer};

/// Build the peer router. Handlers run behind readiness and handshake;
/// every response, including guard rejections, carries protocol headers.
pub fn router(transport: PeerTransport) -> Router {
    let body_limit = transport.config().http.max_body_bytes;

    let peer = Router::new()
        .route("/list", get(handlers::list_peers))
        .route("/blocks/common", get(handlers::common_block))
        .route(
            "/blocks",
            get(handlers::blocks_since).post(handlers::receive_block),
        )
        .route("/votes", post(handlers::receive_votes))
        .route("/propose", post(handlers::receive_propose))
        .route(
            "/signatures",
            get(handlers::list_signatures).post(handlers::receive_signature),
        )
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::submit_transaction),
        )
        .route("/height", get(handlers::height))
        .route("/chain/message", post(handlers::chain_message))
        .route("/chain/request", post(handlers::chain_request))
        .route("/chainReady", post(handlers::chain_ready))
        .fallback(handlers::endpoint_not_found)
        .layer(HandshakeLayer::new(transport.clone()))
        .layer(ReadinessLayer::new(transport.clone()));

    Router::new()
        .nest("/peer", peer)
        .fallback(handlers::endpoint_not_found)
        .layer(ProtocolHeadersLayer::new(transport.headers()))
        .layer(PeerSpanLayer)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(transport)
}

/// Serve `transport` on `listener` until `shutdown` resolves.
pub async fn serve<F>(transport: PeerTransport, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Peer transport listening");
    axum::serve(
        listener,
        router(transport).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryBackend, RegistryCall};
    use crate::domain::{hashsum, TransportConfig};
    use axum::body::{to_bytes, Body};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use shared_types::Transaction;
    use tower::ServiceExt;

    fn setup() -> (PeerTransport, MemoryBackend) {
        let backend = MemoryBackend::new();
        let transport =
            PeerTransport::new(TransportConfig::default(), backend.collaborators()).unwrap();
        transport.mark_ready();
        (transport, backend)
    }

    fn request(transport: &PeerTransport, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let local = transport.headers();
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("magic", &local.magic)
            .header("version", &local.version)
            .header("os", "linux")
            .header("port", "5000")
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], 40000))));
        req
    }

    async fn call(transport: &PeerTransport, req: Request<Body>) -> (StatusCode, Option<Value>, axum::http::HeaderMap) {
        let response = router(transport.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).ok(), headers)
    }

    #[tokio::test]
    async fn test_loading_guard() {
        let (transport, _backend) = setup();
        transport.cleanup();
        let (status, body, headers) = call(&transport, request(&transport, "GET", "/peer/height", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.unwrap()["error"], "Blockchain is loading");
        assert_eq!(headers.get("magic").unwrap(), transport.headers().magic.as_str());
    }

    #[tokio::test]
    async fn test_height_and_registration() {
        let (transport, backend) = setup();
        let (status, body, headers) = call(&transport, request(&transport, "GET", "/peer/height", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.unwrap()["height"], 1);
        assert_eq!(headers.get("port").unwrap(), "4096");
        assert!(matches!(
            backend.registry.calls().as_slice(),
            [RegistryCall::Update(peer)] if peer.port == 5000
        ));
    }

    #[tokio::test]
    async fn test_wrong_magic() {
        let (transport, _backend) = setup();
        let mut req = request(&transport, "GET", "/peer/height", None);
        req.headers_mut().insert("magic", "deadbeef".parse().unwrap());
        let (status, body, _) = call(&transport, req).await;
        let body = body.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["received"], "deadbeef");
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let (transport, _backend) = setup();
        let (status, body, _) = call(&transport, request(&transport, "GET", "/peer/nope", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.unwrap()["error"], "API endpoint not found");
    }

    #[tokio::test]
    async fn test_common_block_query_errors() {
        let (transport, _backend) = setup();
        let (status, body, _) = call(
            &transport,
            request(&transport, "GET", "/peer/blocks/common?min=1&ids=a,b", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.unwrap()["success"], false);

        let (_, body, _) = call(
            &transport,
            request(&transport, "GET", "/peer/blocks/common?max=5&min=1&ids=1", None),
        )
        .await;
        assert_eq!(body.unwrap()["common"]["height"], 1);
    }

    #[tokio::test]
    async fn test_blocks_unknown_id_is_empty() {
        let (transport, _backend) = setup();
        let (_, body, _) = call(
            &transport,
            request(&transport, "GET", "/peer/blocks?lastBlockId=missing", None),
        )
        .await;
        assert_eq!(body.unwrap(), json!({ "blocks": [] }));
    }

    #[tokio::test]
    async fn test_post_bad_block_is_200_and_bans() {
        let (transport, backend) = setup();
        let (status, _, _) = call(
            &transport,
            request(&transport, "POST", "/peer/blocks", Some(json!({ "block": "!!" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(backend
            .registry
            .calls()
            .iter()
            .any(|call| matches!(call, RegistryCall::Ban { port: 5000, .. })));
    }

    #[tokio::test]
    async fn test_transaction_submission() {
        let (transport, _backend) = setup();
        let tx = Transaction {
            id: "t9".into(),
            sender_public_key: "aa".repeat(32),
            ..Default::default()
        };
        let (_, body, _) = call(
            &transport,
            request(&transport, "POST", "/peer/transactions", Some(json!({ "transaction": tx }))),
        )
        .await;
        assert_eq!(body.unwrap(), json!({ "success": true, "transactionId": "t9" }));

        let (_, body, _) = call(&transport, request(&transport, "GET", "/peer/transactions", None)).await;
        assert_eq!(body.unwrap()["transactions"][0]["id"], "t9");
    }

    #[tokio::test]
    async fn test_chain_message_duplicate_is_empty() {
        let (transport, _backend) = setup();
        let inner = json!({ "k": "v" });
        let message = json!({
            "chain": "side",
            "body": inner,
            "timestamp": 77,
            "hash": hashsum(&inner, 77),
        });

        let (_, first, _) = call(
            &transport,
            request(&transport, "POST", "/peer/chain/message", Some(message.clone())),
        )
        .await;
        assert_eq!(first.unwrap()["success"], true);

        let (status, second, _) = call(
            &transport,
            request(&transport, "POST", "/peer/chain/message", Some(message)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_chain_ready_schema() {
        let (transport, _backend) = setup();
        let (status, body, _) = call(
            &transport,
            request(&transport, "POST", "/peer/chainReady", Some(json!({ "chain": "side" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_none());

        let (_, body, _) = call(
            &transport,
            request(&transport, "POST", "/peer/chainReady", Some(json!({}))),
        )
        .await;
        assert_eq!(body.unwrap()["error"], "Schema validation error");
    }

    #[tokio::test]
    async fn test_oversized_body_refused() {
        let backend = MemoryBackend::new();
        let mut config = TransportConfig::default();
        config.http.max_body_bytes = 64;
        let transport = PeerTransport::new(config, backend.collaborators()).unwrap();
        transport.mark_ready();

        let big = json!({ "transaction": "a".repeat(256) });
        let (status, _, _) = call(
            &transport,
            request(&transport, "POST", "/peer/transactions", Some(big)),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
