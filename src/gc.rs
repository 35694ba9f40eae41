/* src/gc.rs */

use crate::store::{Records, sweep_records};
use crate::types::{Duration, current_timestamp_ms};
use tokio::time::{MissedTickBehavior, interval};

pub(crate) struct Sweeper {
    records: Records,
    interval: Duration,
    retention: Duration,
}

impl Sweeper {
    pub(crate) fn new(records: Records, interval: Duration, retention: Duration) -> Self {
        Self {
            records,
            interval,
            retention,
        }
    }

    pub(crate) async fn start(self) {
        // tokio panics on a zero period
        let period = self.interval.as_std().max(std::time::Duration::from_millis(1));
        let mut interval_timer = interval(period);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval_timer.tick().await;

        loop {
            interval_timer.tick().await;
            self.collect_garbage();
        }
    }

    fn collect_garbage(&self) {
        let mut records = self.records.lock();
        let removed = sweep_records(&mut records, current_timestamp_ms(), self.retention);
        tracing::debug!(removed, remaining = records.len(), "rate limit sweep finished");
    }
}
