use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::counter;

use super::clock::Clock;

#[derive(Debug)]
struct Entry {
    text: String,
    stamp: DateTime<Utc>,
}

/// Append-only store of timestamped message texts.
///
/// Entries are stamped under the same lock that appends them, so stamps
/// are non-decreasing in append order and `since` can binary-search for
/// its starting point instead of scanning the whole log.
#[derive(Debug)]
pub struct MessageLog {
    clock: Arc<dyn Clock>,
    entries: Mutex<Vec<Entry>>,
}

impl MessageLog {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Appends `text` at the tail and returns the timestamp it was
    /// stamped with. Always succeeds.
    pub fn append(&self, text: impl Into<String>) -> DateTime<Utc> {
        let mut entries = self.entries.lock().expect("message log lock poisoned");
        let stamp = self.clock.now();
        entries.push(Entry {
            text: text.into(),
            stamp,
        });
        counter!("parlor_messages_total").increment(1);
        stamp
    }

    /// Returns the text of every entry stamped strictly after `t`, in
    /// append order. An entry stamped exactly `t` is excluded: a client
    /// whose next poll reuses a response timestamp as its cursor must not
    /// re-receive the message carrying that exact stamp.
    #[must_use]
    pub fn since(&self, t: DateTime<Utc>) -> Vec<String> {
        let entries = self.entries.lock().expect("message log lock poisoned");
        let start = entries.partition_point(|entry| entry.stamp <= t);
        entries[start..].iter().map(|e| e.text.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("message log lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
