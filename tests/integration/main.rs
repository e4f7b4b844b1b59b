//! Relay transport integration tests.
//!
//! Every test runs real nodes on loopback with OS-assigned ports; no root or
//! network setup needed:
//!
//!   cargo test --test integration
//!
//! Log assertions go through `oec_transport::test_support::LogCapture`, a
//! thread-local capturing subscriber, so tests use the default current-thread
//! runtime and keep all tasks on one thread.

mod listener;
mod reachability;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

use oec_core::config::RelayConfig;
use oec_core::{MessageEnvelope, Payload};
use oec_transport::test_support::{refused_address, spawn_raw_peer, LogCapture, PeerBehavior};
use oec_transport::{ChannelProcessor, HttpTransport, StaticResolver};

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// A started node and the envelopes its listener hands over.
pub struct Node {
    pub transport: HttpTransport,
    pub addr: SocketAddr,
    pub inbound: UnboundedReceiver<MessageEnvelope>,
}

pub fn loopback_config(port: u16) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.instance.name = "test-node".to_string();
    config.http.bind_address = "127.0.0.1".to_string();
    config.http.listen_port = port;
    config
}

/// Start a node on `port` (0 = any) with the given static routes.
pub async fn spawn_node_on(port: u16, routes: &[(&str, String)]) -> Result<Node> {
    let mut config = loopback_config(port);
    for (destination, address) in routes {
        config
            .routes
            .insert(destination.to_string(), address.clone());
    }
    let resolver = StaticResolver::new(config.routes.clone());
    let (processor, inbound) = ChannelProcessor::new();
    let transport = HttpTransport::new(config, Arc::new(resolver), Arc::new(processor));
    let addr = transport.start().await.context("node failed to start")?;
    Ok(Node {
        transport,
        addr,
        inbound,
    })
}

pub async fn spawn_node() -> Result<Node> {
    spawn_node_on(0, &[]).await
}

pub fn envelope(destination: &str, to: SocketAddr, body: &[u8]) -> MessageEnvelope {
    MessageEnvelope::new(destination, Payload::new(body.to_vec()).unwrap())
        .with_network_address(to.to_string())
}
