// src/exec/pending.rs

//! Counter of asynchronous commands that have not exited yet.

use std::sync::Arc;

use tokio::sync::watch;

/// Wait-group style counter.
///
/// [`PendingTracker::begin`] increments the count and hands out a guard that
/// decrements it again on drop, so a runner task can never forget to report
/// completion (including on panic).
#[derive(Debug, Clone)]
pub struct PendingTracker {
    count: Arc<watch::Sender<usize>>,
}

impl PendingTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Register one more pending command.
    pub fn begin(&self) -> PendingGuard {
        self.count.send_modify(|n| *n += 1);
        PendingGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn pending(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolve once no command is pending. Returns immediately if the count
    /// is already zero.
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for PendingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the pending count when dropped.
#[derive(Debug)]
pub struct PendingGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
