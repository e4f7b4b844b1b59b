//! Reachability tracking — one failure report per peer outage.
//!
//! The first failure toward a `host:port` is logged at ERROR and opens an
//! outage record. Further failures to the same address stay silent until a
//! send succeeds, which logs a single INFO recovery notice and closes the
//! record. An address with no record is reachable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Outage {
    since: DateTime<Utc>,
    started: Instant,
}

/// Per-peer outage records, shared by every concurrent send.
#[derive(Clone, Default)]
pub struct ReachabilityTracker {
    // network address -> outage start
    unreachable: Arc<DashMap<String, Outage>>,
}

impl ReachabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure toward `address`.
    ///
    /// Returns true when this call opened the outage and emitted the report.
    pub fn mark_unreachable(&self, address: &str, message: &str) -> bool {
        // The entry guard holds the shard lock, so concurrent callers for the
        // same address cannot both see it vacant.
        match self.unreachable.entry(address.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                tracing::error!(address, "{message}");
                slot.insert(Outage {
                    since: Utc::now(),
                    started: Instant::now(),
                });
                true
            }
        }
    }

    /// Record a success toward `address`.
    ///
    /// Returns how long the peer was down if this call closed an outage.
    pub fn mark_reachable(&self, address: &str) -> Option<Duration> {
        let (_, outage) = self.unreachable.remove(address)?;
        let down_for = outage.started.elapsed();
        let since = outage.since.format("%Y-%m-%d %H:%M:%S%.3f");
        tracing::info!(
            address,
            down_for_ms = down_for.as_millis() as u64,
            "can reach {address} for the first time since {since}"
        );
        Some(down_for)
    }

    pub fn is_unreachable(&self, address: &str) -> bool {
        self.unreachable.contains_key(address)
    }

    /// When the current outage toward `address` began, if there is one.
    pub fn unreachable_since(&self, address: &str) -> Option<DateTime<Utc>> {
        self.unreachable.get(address).map(|o| o.since)
    }

    /// Number of addresses currently considered unreachable.
    pub fn len(&self) -> usize {
        self.unreachable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unreachable.is_empty()
    }
}
