//! Stop coordination for one proxy run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Process-visible running flag shared by the service and every loop it starts.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether the flag was set before.
    pub fn clear(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Wakes the accept loop of a run when it must stop.
///
/// The flag alone cannot interrupt a pending `accept`; the broadcast does.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before the task that waits on it is spawned.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
