use std::fmt::Debug;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current UTC instant.
///
/// Every timestamp the core hands out goes through this trait so that the
/// log and the waiter queue observe a single, never-decreasing notion of
/// "now". A raw wall clock can step backwards (NTP correction) and would
/// break the queue's sortedness invariant that makes the expired-prefix
/// sweep an O(k) scan.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time clamped so consecutive readings never go backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().expect("clock lock poisoned");
        let wall = Utc::now();
        let now = match *last {
            Some(prev) if prev > wall => prev,
            _ => wall,
        };
        *last = Some(now);
        now
    }
}

/// A clock advanced explicitly, for tests that need to control time.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}
