//! Per-connection identity and in-flight tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count handlers that are still framing or relaying

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Relaxed ordering is enough; IDs only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts open client connections across all handlers.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. The count drops when the guard does, including
    /// when the handler task is aborted.
    pub fn track(&self) -> ConnectionGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            open: Arc::clone(&self.open),
            id: ConnectionId::new(),
        }
    }

    pub fn open_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Held by a handler for the lifetime of its connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
