/* src/types.rs */

use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Duration {
    Millis(u64),
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
    Days(u64),
}

impl Duration {
    pub fn millis(n: u64) -> Self {
        Duration::Millis(n)
    }
    pub fn seconds(n: u64) -> Self {
        Duration::Seconds(n)
    }
    pub fn minutes(n: u64) -> Self {
        Duration::Minutes(n)
    }
    pub fn hours(n: u64) -> Self {
        Duration::Hours(n)
    }
    pub fn days(n: u64) -> Self {
        Duration::Days(n)
    }

    pub fn as_millis(&self) -> u64 {
        match self {
            Duration::Millis(n) => *n,
            Duration::Seconds(n) => n.saturating_mul(1_000),
            Duration::Minutes(n) => n.saturating_mul(60_000),
            Duration::Hours(n) => n.saturating_mul(3_600_000),
            Duration::Days(n) => n.saturating_mul(86_400_000),
        }
    }

    pub fn as_std(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.as_millis())
    }
}

/// Limits for one endpoint category.
///
/// `max_requests + burst_allowance` is the hard ceiling for any window.
/// Nothing is validated: a zero ceiling blocks every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            burst_allowance: 0,
        }
    }

    pub fn with_burst(mut self, burst_allowance: u32) -> Self {
        self.burst_allowance = burst_allowance;
        self
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis()
    }

    pub fn total_allowed(&self) -> u32 {
        self.max_requests.saturating_add(self.burst_allowance)
    }
}

/// Per-identifier bookkeeping kept by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestData {
    /// Admission instants in ms since the epoch, in insertion order.
    pub timestamps: Vec<u64>,
    /// Admissions in the current window that went past `max_requests`.
    pub burst_used: u32,
}

impl RequestData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.first().copied()
    }

    pub fn last_activity(&self) -> Option<u64> {
        self.timestamps.last().copied()
    }

    /// Drops every timestamp at or before `window_start`.
    pub fn prune(&mut self, window_start: u64) {
        self.timestamps.retain(|&t| t > window_start);
    }

    /// True once the newest timestamp is more than `retention_ms` behind `now`.
    /// Entries that never admitted anything are always idle.
    pub fn is_idle(&self, now: u64, retention_ms: u64) -> bool {
        match self.last_activity() {
            Some(last) => now.saturating_sub(last) > retention_ms,
            None => true,
        }
    }
}

/// Outcome of a single check. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    /// Instant (ms since the epoch) when the oldest counted request leaves the window.
    pub reset_time: u64,
    pub remaining: u32,
    /// Seconds until `reset_time`, at least 1. Only set on denial.
    pub retry_after: Option<u64>,
}

impl RateLimitResult {
    /// `reset_time` as an ISO-8601 UTC string with millisecond precision.
    pub fn reset_iso8601(&self) -> String {
        let millis = i64::try_from(self.reset_time).unwrap_or(i64::MAX);
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
