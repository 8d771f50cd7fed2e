use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::sync::oneshot;

use super::clock::Clock;

/// The payload a waiter is completed with: the new message texts and the
/// cursor the poller should use next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub messages: Vec<String>,
    pub since: DateTime<Utc>,
}

/// A single-shot completion handle for one parked long-poll request.
///
/// Backed by a oneshot sender, so delivering twice is unrepresentable:
/// completion consumes the waiter.
#[derive(Debug)]
pub struct Waiter {
    tx: oneshot::Sender<Delivery>,
}

impl Waiter {
    /// Completes the waiter. If the poller has already gone away the
    /// delivery is dropped, which is the correct outcome for an abandoned
    /// request.
    pub fn complete(self, messages: Vec<String>, since: DateTime<Utc>) {
        let _ = self.tx.send(Delivery { messages, since });
    }
}

#[derive(Debug)]
struct Parked {
    waiter: Waiter,
    registered_at: DateTime<Utc>,
}

/// Ordered registry of parked waiters.
///
/// Entries are stamped with `registered_at = now` under the queue lock and
/// the clock never goes backwards, so the queue is always sorted ascending
/// by registration time. `drain_expired` relies on that: it stops at the
/// first non-expired entry, certain that no later entry is expired either.
#[derive(Debug)]
pub struct WaiterQueue {
    clock: Arc<dyn Clock>,
    inner: Mutex<VecDeque<Parked>>,
}

impl WaiterQueue {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Registers a new waiter at the tail and returns the receiving end
    /// the caller awaits on.
    pub fn enqueue(&self) -> oneshot::Receiver<Delivery> {
        let (tx, rx) = oneshot::channel();
        let mut queue = self.inner.lock().expect("waiter queue lock poisoned");
        let registered_at = self.clock.now();
        queue.push_back(Parked {
            waiter: Waiter { tx },
            registered_at,
        });
        counter!("parlor_waiters_parked_total").increment(1);
        gauge!("parlor_waiters_parked").set(queue.len() as f64);
        rx
    }

    /// Atomically removes and returns every queued waiter, oldest first,
    /// leaving the queue empty. Broadcast semantics: every waiter present
    /// at the moment a message arrives gets that message, and only those.
    pub fn drain_all(&self) -> Vec<Waiter> {
        let mut queue = self.inner.lock().expect("waiter queue lock poisoned");
        let drained = queue.drain(..).map(|parked| parked.waiter).collect();
        gauge!("parlor_waiters_parked").set(0.0);
        drained
    }

    /// Removes and returns every waiter registered at or before `cutoff`
    /// (inclusive), oldest first. Scans from the head and stops at the
    /// first entry past the cutoff, which the sortedness invariant makes
    /// safe.
    pub fn drain_expired(&self, cutoff: DateTime<Utc>) -> Vec<Waiter> {
        let mut queue = self.inner.lock().expect("waiter queue lock poisoned");
        let mut expired = Vec::new();
        while queue
            .front()
            .is_some_and(|parked| parked.registered_at <= cutoff)
        {
            if let Some(parked) = queue.pop_front() {
                expired.push(parked.waiter);
            }
        }
        gauge!("parlor_waiters_parked").set(queue.len() as f64);
        expired
    }

    /// Number of currently parked waiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("waiter queue lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
