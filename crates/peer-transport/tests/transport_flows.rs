//! # Transport Flow Tests
//!
//! End-to-end flows through the public `PeerTransport` API with the
//! in-memory collaborators:
//!
//! 1. concurrent admission of the same transaction
//! 2. replay of a rejected transaction
//! 3. broadcast fan-out bounds
//! 4. bridge message dedup and relay
//! 5. event bus to broadcast forwarding

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use peer_transport::adapters::memory::{MemoryBackend, RegistryCall, Scripted};
use peer_transport::domain::{hashsum, FailureKind};
use peer_transport::{
    MessageOutcome, Peer, PeerSelector, PeerTransport, RemotePeer, RequestSpec, TransportConfig,
    TransportError,
};
use serde_json::json;
use shared_bus::{EventPublisher, InMemoryEventBus, TransportEvent};
use shared_types::{ChainMessage, Transaction};
use tokio::time::timeout;

fn ready_transport() -> (PeerTransport, MemoryBackend) {
    let backend = MemoryBackend::new();
    let transport = PeerTransport::new(TransportConfig::default(), backend.collaborators())
        .expect("default config is valid");
    transport.mark_ready();
    (transport, backend)
}

fn transaction(id: &str) -> Transaction {
    Transaction {
        id: id.into(),
        timestamp: 42,
        sender_public_key: "cd".repeat(32),
        sender_id: "S1".into(),
        fee: 10_000_000,
        args: vec!["5".into(), "R1".into()],
        signatures: vec!["ef".repeat(64)],
        ..Default::default()
    }
}

fn origin() -> RemotePeer {
    RemotePeer {
        ip: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
        port: Some(4096),
    }
}

fn seed_peers(backend: &MemoryBackend, count: u32) {
    for i in 0..count {
        let mut peer = Peer::new(0x0a00_0000 + i + 1, 4096);
        peer.version = Some("1.0.0".into());
        backend.registry.insert(peer);
    }
}

#[tokio::test]
async fn test_concurrent_identical_submissions_admit_once() {
    let (transport, backend) = ready_transport();
    backend.mempool.set_delay(Duration::from_millis(50));
    let body = json!({ "transaction": transaction("dup-1") });
    let origin = origin();

    let outcomes = join_all((0..4).map(|_| transport.submit_transaction(&body, &origin))).await;

    let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
    // All four pass the rejection cache before the first takes its turn,
    // so the losers are refused by the pool check.
    let refused = outcomes
        .iter()
        .filter(|r| matches!(r, Err(TransportError::AlreadyExists)))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(refused, 3);
    assert_eq!(backend.mempool.receive_calls(), 1);
}

#[tokio::test]
async fn test_replayed_rejection_skips_mempool() {
    let (transport, backend) = ready_transport();
    backend.mempool.reject("bad-1", "Invalid signature");
    let body = json!({ "transaction": transaction("bad-1") });

    let first = transport.submit_transaction(&body, &origin()).await;
    assert_eq!(first, Err(TransportError::Rejected("Invalid signature".into())));

    for _ in 0..3 {
        let again = transport.submit_transaction(&body, &origin()).await;
        assert_eq!(again, Err(TransportError::AlreadyProcessed("bad-1".into())));
    }
    assert_eq!(backend.mempool.receive_calls(), 1);
    assert!(backend.events.events().is_empty());
}

#[tokio::test]
async fn test_admission_reopens_once_chain_catches_up() {
    let (transport, backend) = ready_transport();
    backend.clock.advance(Duration::from_secs(300));
    let body = json!({ "transaction": transaction("late-1") });

    assert_eq!(
        transport.submit_transaction(&body, &origin()).await,
        Err(TransportError::NotReady)
    );

    backend.chain.push_block(shared_types::Block {
        id: "2".into(),
        height: 2,
        timestamp: 1_700_000_300 - 1_467_057_600,
        ..Default::default()
    });
    assert_eq!(
        transport.submit_transaction(&body, &origin()).await,
        Ok("late-1".to_string())
    );
}

#[tokio::test]
async fn test_broadcast_samples_and_bounds_concurrency() {
    let (transport, backend) = ready_transport();
    seed_peers(&backend, 40);
    backend.http.set_delay(Duration::from_millis(20));

    let report = transport
        .broadcast(PeerSelector::default(), RequestSpec::post("/height", json!({})))
        .await
        .expect("registry is healthy");
    assert_eq!(report.dispatched, 20);

    timeout(Duration::from_secs(5), backend.http.wait_for_requests(20))
        .await
        .expect("every send is eventually issued");
    assert!(backend.http.max_in_flight() <= 5);
}

#[tokio::test]
async fn test_broadcast_failures_feed_reputation() {
    let (transport, backend) = ready_transport();
    seed_peers(&backend, 2);
    backend
        .http
        .script("http://10.0.0.1:4096", Scripted::Fail(FailureKind::ConnectionRefused));
    backend.http.script("http://10.0.0.2:4096", Scripted::status(500));

    transport
        .broadcast(PeerSelector::default(), RequestSpec::post("/blocks", json!({})))
        .await
        .expect("registry is healthy");
    timeout(Duration::from_secs(5), backend.http.wait_for_requests(2))
        .await
        .expect("both sends issued");

    timeout(Duration::from_secs(5), async {
        loop {
            if backend.registry.calls().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("both peers penalized");

    let calls = backend.registry.calls();
    assert!(calls
        .iter()
        .any(|call| matches!(call, RegistryCall::Remove { ip: 0x0a00_0001, port: 4096 })));
    assert!(calls.iter().any(|call| matches!(
        call,
        RegistryCall::Ban { ip: 0x0a00_0002, duration, .. } if *duration == Duration::from_secs(600)
    )));
}

#[tokio::test]
async fn test_bridge_message_delivered_once() {
    let (transport, backend) = ready_transport();
    let body = json!({ "transfer": { "amount": 7 } });
    let message = ChainMessage {
        chain: Some("sidechain-a".into()),
        body: body.clone(),
        timestamp: Some(1_700_000_000_123),
        hash: Some(hashsum(&body, 1_700_000_000_123)),
    };

    let first = transport
        .receive_chain_message(message.clone())
        .await
        .expect("valid hash");
    assert!(matches!(first, MessageOutcome::Delivered(ref answer) if answer["success"] == true));

    let second = transport.receive_chain_message(message).await.expect("valid hash");
    assert_eq!(second, MessageOutcome::Duplicate);
    assert_eq!(backend.relay.messages().len(), 1);
}

#[tokio::test]
async fn test_tampered_bridge_message_refused() {
    let (transport, backend) = ready_transport();
    let message = ChainMessage {
        chain: Some("sidechain-a".into()),
        body: json!({ "n": 2 }),
        timestamp: Some(5),
        hash: Some(hashsum(&json!({ "n": 1 }), 5)),
    };

    let err = transport.receive_chain_message(message).await.unwrap_err();
    assert_eq!(err, TransportError::WrongHashSum);
    assert!(backend.relay.messages().is_empty());
}

#[tokio::test]
async fn test_relayed_message_targets_chain_peers() {
    let (transport, backend) = ready_transport();
    let mut member = Peer::new(0x0a00_0063, 4096);
    member.chain = Some("sidechain-a".into());
    backend.registry.insert(member);
    seed_peers(&backend, 3);

    let report = transport
        .relay_message("sidechain-a", json!({ "ping": true }))
        .await
        .expect("registry is healthy");
    assert_eq!(report.dispatched, 1);

    timeout(Duration::from_secs(5), backend.http.wait_for_requests(1))
        .await
        .expect("send issued");
    let request = &backend.http.requests()[0];
    assert_eq!(request.url, "http://10.0.0.99:4096/peer/chain/message");
    let payload = request.payload.as_ref().expect("post has a payload");
    let timestamp = payload["timestamp"].as_u64().expect("stamped");
    assert_eq!(payload["hash"], hashsum(&json!({ "ping": true }), timestamp));
}

#[tokio::test]
async fn test_bus_events_are_gossiped() {
    let backend = MemoryBackend::new();
    seed_peers(&backend, 3);
    let bus = Arc::new(InMemoryEventBus::new());
    let mut deps = backend.collaborators();
    deps.bus = bus.clone();
    let transport = PeerTransport::new(TransportConfig::default(), deps).expect("valid config");
    let forwarder = transport.spawn_event_forwarder(&bus);

    bus.publish(TransportEvent::UnconfirmedTransaction {
        transaction: transaction("gossip-1"),
        broadcast: true,
    })
    .await;
    bus.publish(TransportEvent::UnconfirmedTransaction {
        transaction: transaction("quiet-1"),
        broadcast: false,
    })
    .await;

    timeout(Duration::from_secs(5), backend.http.wait_for_requests(3))
        .await
        .expect("gossip sent to every peer");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let requests = backend.http.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.url.ends_with("/peer/transactions")));
    assert!(requests.iter().all(|r| {
        r.payload.as_ref().map(|p| p["transaction"]["id"].clone()) == Some(json!("gossip-1"))
    }));

    forwarder.abort();
}
