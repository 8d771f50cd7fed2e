use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::oneshot;
use tracing::debug;

use super::clock::Clock;
use super::message_log::MessageLog;
use super::waiter_queue::{Delivery, WaiterQueue};

/// Outcome of a message query: either answered on the spot or parked
/// until a broadcast or the idle sweep completes it.
#[derive(Debug)]
pub enum MessagesTurn {
    /// The log already held newer messages; answer immediately.
    Ready(Delivery),
    /// Nothing new yet. Await the receiver; it resolves exactly once,
    /// from whichever of broadcast or sweep dequeues the waiter first.
    Parked(oneshot::Receiver<Delivery>),
}

/// The chat room: coordinates the message log and the waiter queue.
///
/// Owns no state of its own beyond the two collaborators. Posting a
/// message broadcasts it to every currently parked waiter; querying
/// either answers from the log or parks the caller.
#[derive(Debug)]
pub struct ChatRoom {
    log: MessageLog,
    waiters: WaiterQueue,
}

impl ChatRoom {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            log: MessageLog::new(clock.clone()),
            waiters: WaiterQueue::new(clock),
        }
    }

    /// Appends `text` to the log, then completes every parked waiter with
    /// a single-element list holding just this text and its stamp. Waiters
    /// are completed in registration order.
    pub fn add_message(&self, text: &str) {
        let stamp = self.log.append(text);
        let waiters = self.waiters.drain_all();
        if !waiters.is_empty() {
            counter!("parlor_broadcast_deliveries_total").increment(waiters.len() as u64);
            debug!(waiters = waiters.len(), "broadcasting new message");
        }
        for waiter in waiters {
            waiter.complete(vec![text.to_owned()], stamp);
        }
    }

    /// Posts the standard room-entry announcement for `name`.
    pub fn add_participant(&self, name: &str) {
        self.add_message(&format!("{name} has entered the room."));
    }

    /// Posts the standard room-exit announcement for `name`.
    pub fn remove_participant(&self, name: &str) {
        self.add_message(&format!("{name} left the room."));
    }

    /// Answers with everything stamped strictly after `since`, or parks
    /// the caller when there is nothing new.
    ///
    /// The immediate answer echoes the caller-supplied `since` rather
    /// than a fresh timestamp; advancing the cursor is the caller's
    /// policy decision.
    pub fn get_messages(&self, since: DateTime<Utc>) -> MessagesTurn {
        let messages = self.log.since(since);
        if messages.is_empty() {
            MessagesTurn::Parked(self.waiters.enqueue())
        } else {
            MessagesTurn::Ready(Delivery { messages, since })
        }
    }

    /// The waiter registry, shared with the idle sweeper.
    #[must_use]
    pub fn waiter_queue(&self) -> &WaiterQueue {
        &self.waiters
    }

    /// Number of currently parked waiters.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }
}
