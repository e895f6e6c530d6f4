//! Active client tracking.
//!
//! # Responsibilities
//! - Record the source address of every accepted connection
//! - Report how many distinct addresses were seen within the TTL
//!
//! # Design Decisions
//! - Keyed by IP, so concurrent connections from one address coalesce
//! - Pruning piggybacks on reads; there is no background sweeper
//! - DashMap gives per-key updates without a global lock

use dashmap::DashMap;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::observability::metrics;

/// Default time after which a silent address is forgotten.
pub const CLIENT_TTL: Duration = Duration::from_millis(120_000);

/// One tracked client address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientEntry {
    pub address: IpAddr,
    pub last_seen_ms: i64,
    pub age_ms: i64,
}

/// Shared map of client address to last-seen time (epoch millis).
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    inner: Arc<DashMap<IpAddr, i64>>,
    ttl_ms: i64,
}

impl ClientRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Record or refresh an address as seen now.
    pub fn record(&self, address: IpAddr) {
        self.record_at(address, now_millis());
    }

    /// Record or refresh an address with an explicit timestamp.
    pub fn record_at(&self, address: IpAddr, now_ms: i64) {
        self.inner.insert(address, now_ms);
    }

    /// Prune expired entries, then count the rest.
    pub fn active_count(&self) -> usize {
        self.active_count_at(now_millis())
    }

    pub fn active_count_at(&self, now_ms: i64) -> usize {
        self.prune_at(now_ms);
        let count = self.inner.len();
        metrics::record_active_clients(count);
        count
    }

    /// Prune expired entries, then list the rest, most recent first.
    pub fn snapshot(&self) -> Vec<ClientEntry> {
        self.snapshot_at(now_millis())
    }

    pub fn snapshot_at(&self, now_ms: i64) -> Vec<ClientEntry> {
        self.prune_at(now_ms);
        let mut entries: Vec<ClientEntry> = self
            .inner
            .iter()
            .map(|entry| ClientEntry {
                address: *entry.key(),
                last_seen_ms: *entry.value(),
                age_ms: now_ms.saturating_sub(*entry.value()),
            })
            .collect();
        entries.sort_by(|a, b| b.last_seen_ms.cmp(&a.last_seen_ms));
        entries
    }

    /// Forget every address.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// An entry expires once its age reaches the TTL.
    fn prune_at(&self, now_ms: i64) {
        let ttl = self.ttl_ms;
        self.inner
            .retain(|_, last_seen| now_ms.saturating_sub(*last_seen) < ttl);
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(CLIENT_TTL)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
