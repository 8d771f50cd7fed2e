use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::clock::Clock;
use super::room::ChatRoom;

/// Periodic task that force-completes waiters left parked longer than the
/// configured idle limit, handing each an empty message list and a cursor
/// one second behind the sweep time.
///
/// The period is half the idle limit (floored to whole seconds), so no
/// waiter sits expired-but-undetected for more than half the limit before
/// the next tick catches it.
#[derive(Debug)]
pub struct IdleSweeper {
    room: Arc<ChatRoom>,
    clock: Arc<dyn Clock>,
    idle_limit: Duration,
    period: StdDuration,
    cancel: CancellationToken,
}

impl IdleSweeper {
    #[must_use]
    pub fn new(room: Arc<ChatRoom>, clock: Arc<dyn Clock>, idle_limit_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            room,
            clock,
            idle_limit: Duration::seconds(i64::try_from(idle_limit_secs).unwrap_or(i64::MAX)),
            period: StdDuration::from_secs((idle_limit_secs / 2).max(1)),
            cancel: CancellationToken::new(),
        })
    }

    /// One sweep: drains every waiter registered at or before
    /// `now - idle_limit` and completes it with an empty result.
    ///
    /// The returned cursor is `now - 1s` rather than `now`, so the
    /// client's immediate next poll still lands in the server's past and
    /// cannot skip a message posted in the gap.
    pub fn tick(&self) {
        let now = self.clock.now();
        let cutoff = now - self.idle_limit;
        let expired = self.room.waiter_queue().drain_expired(cutoff);
        counter!("parlor_sweeps_total").increment(1);

        if expired.is_empty() {
            debug!("idle sweep found no expired waiters");
            return;
        }

        let new_since = now - Duration::seconds(1);
        counter!("parlor_idle_completions_total").increment(expired.len() as u64);
        info!(expired = expired.len(), "completing idle waiters");
        for waiter in expired {
            waiter.complete(Vec::new(), new_since);
        }
    }

    /// Spawns the periodic sweep. Runs until [`IdleSweeper::shutdown`];
    /// an in-flight tick is allowed to finish.
    pub fn run(self: &Arc<Self>) -> JoinHandle<()> {
        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweeper.period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = sweeper.cancel.cancelled() => {
                        info!("idle sweeper stopped");
                        break;
                    }
                    _ = interval.tick() => sweeper.tick(),
                }
            }
        })
    }

    /// Stops accepting new ticks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the sweeper is still accepting ticks.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}
