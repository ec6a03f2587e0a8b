//! Publish Scheduler
//!
//! Streams can deliver chunks far faster than a terminal can redraw. The
//! consumer hands every snapshot to [`PublishScheduler::publish`]; the render
//! loop picks up only the newest one per frame with [`PublishScheduler::take`].
//!
//! There is never more than one publish outstanding. Arrivals while one is
//! pending overwrite the latest cell instead of queueing behind it, so a slow
//! frame costs at most one stale snapshot, never a backlog.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Slot {
    latest: Option<String>,
    pending: bool,
    published: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slot: Mutex<Slot>,
    ready: Notify,
}

/// Coalescing hand-off between a stream consumer and the render loop
#[derive(Clone, Debug, Default)]
pub struct PublishScheduler {
    inner: Arc<Inner>,
}

impl PublishScheduler {
    /// Create an empty scheduler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a new snapshot
    ///
    /// Overwrites any snapshot that has not been taken yet. Only the first
    /// publish after a `take` wakes the render loop.
    pub fn publish(&self, snapshot: impl Into<String>) {
        let schedule = {
            let mut slot = self.inner.slot.lock();
            slot.latest = Some(snapshot.into());
            slot.published += 1;
            !std::mem::replace(&mut slot.pending, true)
        };
        if schedule {
            self.inner.ready.notify_one();
        }
    }

    /// Take the newest snapshot, if one arrived since the last frame
    #[must_use]
    pub fn take(&self) -> Option<String> {
        let mut slot = self.inner.slot.lock();
        slot.pending = false;
        slot.latest.take()
    }

    /// Whether a snapshot is waiting for the next frame
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.slot.lock().pending
    }

    /// Total snapshots offered, including coalesced ones
    #[must_use]
    pub fn published(&self) -> u64 {
        self.inner.slot.lock().published
    }

    /// Wait until a snapshot is pending
    pub async fn ready(&self) {
        loop {
            let notified = self.inner.ready.notified();
            if self.is_pending() {
                return;
            }
            notified.await;
        }
    }
}
