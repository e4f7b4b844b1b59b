//! oecd — relay node daemon.
//!
//! Listens for relayed messages on the configured port and logs each one.
//! Outbound routes come from the `[routes]` table of the config file.

use std::sync::Arc;

use anyhow::{Context, Result};

use oec_core::config::RelayConfig;
use oec_transport::{ChannelProcessor, HttpTransport, StaticResolver};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    match RelayConfig::write_default_if_missing() {
        Ok(path) => tracing::info!(path = %path.display(), "config file"),
        Err(e) => tracing::warn!(error = %e, "failed to write default config"),
    }
    let config = RelayConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        RelayConfig::default()
    });

    let resolver = StaticResolver::new(config.routes.clone());
    tracing::info!(routes = resolver.len(), "static routes loaded");

    let (processor, mut inbound) = ChannelProcessor::new();
    let transport = HttpTransport::new(config, Arc::new(resolver), Arc::new(processor));
    transport
        .start()
        .await
        .context("failed to start HTTP transport")?;

    let receiver_task = tokio::spawn(async move {
        while let Some(envelope) = inbound.recv().await {
            tracing::info!(
                destination = %envelope.destination_address,
                hop_count = envelope.hop_count,
                to_be_queued = envelope.to_be_queued,
                len = envelope.payload.len(),
                from = envelope.sender_network_address.as_deref().unwrap_or("?"),
                "message received"
            );
        }
    });

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        }
        r = receiver_task => tracing::error!("receiver task exited: {:?}", r),
    }

    transport.stop().await;
    Ok(())
}
