/* src/store.rs */

use crate::error::{LimitError, Result};
use crate::gc::Sweeper;
use crate::types::{Duration, RequestData};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub(crate) type Records = Arc<Mutex<HashMap<String, RequestData>>>;

/// Process-local map from identifier to its request history.
///
/// Every read-prune-compare-write sequence runs under one lock, and the
/// background sweep takes the same lock.
#[derive(Debug, Default)]
pub struct RateLimitStore {
    records: Records,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the periodic sweep. Calling it again restarts the task.
    pub fn init(&self, interval: Duration, retention: Duration) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LimitError::NoRuntime)?;
        let sweeper = Sweeper::new(self.records.clone(), interval, retention);
        let handle = runtime.spawn(sweeper.start());

        if let Some(previous) = self.sweeper.lock().replace(handle) {
            previous.abort();
        }
        tracing::info!(
            interval_ms = interval.as_millis(),
            retention_ms = retention.as_millis(),
            "rate limit sweeper started"
        );
        Ok(())
    }

    /// Cancels the sweep. Stored entries are kept.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
            tracing::info!("rate limit sweeper stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Runs `f` on the entry for `key`, creating it first if needed, while holding the lock.
    pub fn with_entry<T, F>(&self, key: &str, f: F) -> T
    where
        F: FnOnce(&mut RequestData) -> T,
    {
        let mut records = self.records.lock();
        f(records.entry(key.to_string()).or_default())
    }

    pub fn get(&self, key: &str) -> Option<RequestData> {
        self.records.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, data: RequestData) {
        self.records.lock().insert(key.to_string(), data);
    }

    pub fn delete(&self, key: &str) -> Option<RequestData> {
        self.records.lock().remove(key)
    }

    /// Removes entries idle for longer than `retention`, returning how many went.
    pub fn sweep(&self, now: u64, retention: Duration) -> usize {
        sweep_records(&mut self.records.lock(), now, retention)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Drop for RateLimitStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

pub(crate) fn sweep_records(
    records: &mut HashMap<String, RequestData>,
    now: u64,
    retention: Duration,
) -> usize {
    let retention_ms = retention.as_millis();
    let before = records.len();
    records.retain(|_key, data| !data.is_idle(now, retention_ms));
    before - records.len()
}
