//! # HTTP Loopback Tests
//!
//! Two transports talking over real sockets: one serves `/peer`, the other
//! calls it through the reqwest exchange.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use peer_transport::adapters::memory::{MemoryBackend, RegistryCall};
use peer_transport::adapters::ReqwestExchange;
use peer_transport::domain::PeerState;
use peer_transport::{Peer, PeerTransport, RequestSpec, TransportConfig};
use serde_json::json;
use shared_types::Transaction;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Server {
    backend: MemoryBackend,
    port: u16,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn start_server() -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut config = TransportConfig::default();
    config.http.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.http.port = port;

    let backend = MemoryBackend::new();
    let transport = PeerTransport::new(config, backend.collaborators()).unwrap();
    transport.mark_ready();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = transport
            .serve(listener, async {
                let _ = stopped.await;
            })
            .await;
    });

    Server {
        backend,
        port,
        stop: Some(stop),
    }
}

fn client(config: TransportConfig) -> (PeerTransport, MemoryBackend) {
    let backend = MemoryBackend::new();
    let mut deps = backend.collaborators();
    deps.http = Arc::new(ReqwestExchange::new().unwrap());
    let transport = PeerTransport::new(config, deps).unwrap();
    (transport, backend)
}

fn localhost(port: u16) -> Peer {
    Peer::new(u32::from(Ipv4Addr::LOCALHOST), port)
}

#[tokio::test]
async fn test_height_round_trip_refreshes_both_sides() {
    let server = start_server().await;
    let (transport, backend) = client(TransportConfig::default());

    let reply = transport
        .get_from_peer(&localhost(server.port), RequestSpec::get("/height"))
        .await
        .unwrap();
    assert_eq!(reply.body["height"], 1);

    // The client refreshed the server from its response headers.
    assert!(matches!(
        backend.registry.calls().as_slice(),
        [RegistryCall::Update(peer)] if peer.port == server.port && peer.state == PeerState::Active
    ));

    // The server registered the client under its advertised port.
    let registered = server
        .backend
        .registry
        .get(u32::from(Ipv4Addr::LOCALHOST), 4096)
        .expect("client registered");
    assert_eq!(registered.state, PeerState::Active);
}

#[tokio::test]
async fn test_pushed_transaction_reaches_remote_mempool() {
    let server = start_server().await;
    let (transport, _backend) = client(TransportConfig::default());
    let tx = Transaction {
        id: "wire-1".into(),
        sender_public_key: "ab".repeat(32),
        ..Default::default()
    };

    let reply = transport
        .get_from_peer(
            &localhost(server.port),
            RequestSpec::post("/transactions", json!({ "transaction": tx })),
        )
        .await
        .unwrap();
    assert_eq!(reply.body, json!({ "success": true, "transactionId": "wire-1" }));
    assert_eq!(server.backend.mempool.receive_calls(), 1);
}

#[tokio::test]
async fn test_foreign_network_is_refused() {
    let server = start_server().await;
    let mut config = TransportConfig::default();
    config.protocol.magic = "0badf00d".into();
    let (transport, _backend) = client(config);

    let reply = transport
        .get_from_peer(&localhost(server.port), RequestSpec::get("/height"))
        .await
        .unwrap();
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["received"], "0badf00d");
    assert!(server.backend.registry.calls().is_empty());
}

#[tokio::test]
async fn test_stopped_server_is_removed() {
    let server = start_server().await;
    let port = server.port;
    drop(server);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (transport, backend) = client(TransportConfig::default());
    let err = transport
        .get_from_peer(&localhost(port), RequestSpec::get("/height"))
        .await
        .unwrap_err();
    assert!(err.failure.kind.is_unreachable());
    assert!(matches!(
        backend.registry.calls().as_slice(),
        [RegistryCall::Remove { port: p, .. }] if *p == port
    ));
}
