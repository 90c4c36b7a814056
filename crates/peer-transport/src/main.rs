//! Standalone peer transport node backed by in-memory collaborators.
//!
//! Usage: `peer-transport [config.toml]`

use anyhow::{Context, Result};
use shared_bus::InMemoryEventBus;
use shared_types::Block;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use peer_transport::adapters::memory::MemoryBackend;
use peer_transport::adapters::{ReqwestExchange, SystemTimeSource};
use peer_transport::domain::SlotClock;
use peer_transport::ports::TimeSource;
use peer_transport::{telemetry, PeerTransport, TransportConfig};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing("info")?;

    let config = match std::env::args().nth(1) {
        Some(path) => {
            TransportConfig::load(&path).with_context(|| format!("loading config from {path}"))?
        }
        None => TransportConfig::default(),
    };

    let backend = MemoryBackend::new();
    let slots = SlotClock::new(&config.slots);
    backend.chain.push_block(Block {
        id: "2".into(),
        height: 2,
        timestamp: slots.epoch_time(SystemTimeSource.now_millis()),
        ..Default::default()
    });

    let bus = Arc::new(InMemoryEventBus::new());
    let mut deps = backend.collaborators();
    deps.http = Arc::new(ReqwestExchange::new().context("building HTTP client")?);
    deps.clock = Arc::new(SystemTimeSource);
    deps.bus = bus.clone();

    let transport = PeerTransport::new(config, deps)?;
    let forwarder = transport.spawn_event_forwarder(&bus);

    let addr = transport.config().http_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    transport.mark_ready();
    transport.serve(listener, shutdown_signal()).await?;

    transport.cleanup();
    forwarder.abort();
    info!("Peer transport stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
