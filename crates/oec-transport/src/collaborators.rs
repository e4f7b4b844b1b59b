//! Collaborator seams — what the transport needs from the rest of the node.
//!
//! Address resolution and message processing live outside the transport.
//! Both traits are synchronous; the listener runs processors on the blocking
//! pool so a slow processor only holds up its own request.

use std::collections::BTreeMap;

use oec_core::MessageEnvelope;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no route to destination {0:?}")]
    NoRoute(String),
}

/// Maps a logical destination to the `host:port` of the next hop.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, destination: &str) -> Result<String, ResolveError>;
}

/// Receives every message accepted by the listener.
///
/// Called once per message, before the sender is acknowledged. Failures
/// inside `process` are the processor's own business.
pub trait MessageProcessor: Send + Sync {
    fn process(&self, envelope: MessageEnvelope);
}

// ── Static routes ─────────────────────────────────────────────────────────────

/// Resolver over a fixed route table, typically `RelayConfig::routes`.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    routes: BTreeMap<String, String>,
}

impl StaticResolver {
    pub fn new(routes: BTreeMap<String, String>) -> Self {
        Self { routes }
    }

    pub fn insert(&mut self, destination: impl Into<String>, network_address: impl Into<String>) {
        self.routes.insert(destination.into(), network_address.into());
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl AddressResolver for StaticResolver {
    fn resolve(&self, destination: &str) -> Result<String, ResolveError> {
        self.routes
            .get(destination)
            .cloned()
            .ok_or_else(|| ResolveError::NoRoute(destination.to_string()))
    }
}

// ── Channel processor ─────────────────────────────────────────────────────────

/// Forwards received envelopes into an mpsc channel.
pub struct ChannelProcessor {
    tx: mpsc::UnboundedSender<MessageEnvelope>,
}

impl ChannelProcessor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MessageEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageProcessor for ChannelProcessor {
    fn process(&self, envelope: MessageEnvelope) {
        if self.tx.send(envelope).is_err() {
            tracing::warn!("message receiver dropped, discarding inbound message");
        }
    }
}
