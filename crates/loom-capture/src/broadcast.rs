//! Commit-barrier broadcaster (§4.6, §5 "Commit-barrier broadcaster").
//!
//! The driver's `wait_for_resource_commit` (§4.7) means "every resource the
//! executor handed to the Consumer for this phase is now visible in the
//! catalog," not merely "one more commit happened somewhere" — so this
//! tracks a `sent`/`committed` pair of counters alongside the broadcast
//! channel. `tokio::sync::broadcast`'s `Lagged` semantics ("a slow
//! subscriber misses notifications, it does not get a buffered backlog")
//! are still the right primitive for *waking up* a waiter; the counters are
//! what make the wake-up condition correct under concurrent senders.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy)]
pub struct Commit;

struct Counters {
    sent: AtomicU64,
    committed: AtomicU64,
}

pub struct CommitBarrier {
    tx: broadcast::Sender<Commit>,
    counters: Arc<Counters>,
}

impl CommitBarrier {
    pub fn new() -> Self {
        // Capacity is a lag allowance, not a queue depth: a subscriber more
        // than this many commits behind simply gets `Lagged`, which this
        // module treats as "re-check the counters," not an error.
        let (tx, _rx) = broadcast::channel(64);
        Self { tx, counters: Arc::new(Counters { sent: AtomicU64::new(0), committed: AtomicU64::new(0) }) }
    }

    pub fn subscriber(&self) -> CommitWaiter {
        CommitWaiter { rx: self.tx.subscribe(), counters: self.counters.clone() }
    }

    /// Called by the executor once it knows how many files it is about to
    /// hand off to the Consumer for the current task (§4.4 step 5).
    pub fn note_sent(&self, n: u64) {
        self.counters.sent.fetch_add(n, Ordering::SeqCst);
    }

    /// Called by the Consumer after a resource insert becomes visible.
    pub fn note_committed(&self) {
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        // No subscribers is not an error: nothing is waiting yet.
        let _ = self.tx.send(Commit);
    }
}

impl Default for CommitBarrier {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CommitWaiter {
    rx: broadcast::Receiver<Commit>,
    counters: Arc<Counters>,
}

impl CommitWaiter {
    /// Blocks until every file sent to the Consumer so far has been
    /// committed. Returns immediately if that is already true.
    pub async fn wait_for_resource_commit(&mut self) {
        while self.counters.committed.load(Ordering::SeqCst) < self.counters.sent.load(Ordering::SeqCst) {
            match self.rx.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waiter_returns_immediately_with_nothing_pending() {
        let barrier = CommitBarrier::new();
        let mut waiter = barrier.subscriber();
        waiter.wait_for_resource_commit().await;
    }

    #[tokio::test]
    async fn waiter_blocks_until_sent_count_is_committed() {
        let barrier = Arc::new(CommitBarrier::new());
        barrier.note_sent(2);
        let mut waiter = barrier.subscriber();

        let barrier2 = barrier.clone();
        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
            barrier2.note_committed();
            barrier2.note_committed();
        });

        waiter.wait_for_resource_commit().await;
        assert!(barrier.counters.committed.load(Ordering::SeqCst) >= barrier.counters.sent.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn closed_sender_unblocks_waiter_instead_of_hanging() {
        let barrier = CommitBarrier::new();
        barrier.note_sent(1);
        let mut waiter = barrier.subscriber();
        drop(barrier);
        waiter.wait_for_resource_commit().await;
    }
}
