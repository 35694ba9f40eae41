/* src/limiter.rs */

use crate::config::{Category, PolicyTable};
use crate::error::Result;
use crate::ip::{RequestLike, get_client_ip};
use crate::store::RateLimitStore;
use crate::types::{RateLimitConfig, RateLimitResult, RequestData, current_timestamp_ms};

/// What happened to a request that went through the gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rate limiting is switched off for this deployment.
    Disabled,
    /// The caller is on the safe-list.
    SafeListed,
    /// The path is not rate limited.
    Unmatched,
    Checked(RateLimitResult),
}

impl Outcome {
    pub fn is_denied(&self) -> bool {
        matches!(self, Outcome::Checked(result) if !result.allowed)
    }

    pub fn result(&self) -> Option<&RateLimitResult> {
        match self {
            Outcome::Checked(result) => Some(result),
            _ => None,
        }
    }
}

/// Main rate limiter implementation
#[derive(Debug)]
pub struct RateLimiter {
    policy: PolicyTable,
    store: RateLimitStore,
}

impl RateLimiter {
    /// Creates a limiter without a background sweep. See [`RateLimiter::start`].
    pub fn new(policy: PolicyTable) -> Self {
        Self {
            policy,
            store: RateLimitStore::new(),
        }
    }

    /// Creates a limiter and starts its sweep on the current tokio runtime.
    pub fn start(policy: PolicyTable) -> Result<Self> {
        let limiter = Self::new(policy);
        limiter
            .store
            .init(limiter.policy.sweep_interval, limiter.policy.retention)?;
        if limiter.policy.retention.as_millis() < limiter.policy.max_window().as_millis() {
            tracing::warn!(
                retention_ms = limiter.policy.retention.as_millis(),
                "retention is shorter than the longest window, live entries may be swept"
            );
        }
        Ok(limiter)
    }

    pub fn shutdown(&self) {
        self.store.shutdown();
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn store(&self) -> &RateLimitStore {
        &self.store
    }

    /// Checks and records one request for `identifier`. Never fails.
    pub fn check_rate_limit(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
        self.check_rate_limit_at(identifier, config, current_timestamp_ms())
    }

    pub(crate) fn check_rate_limit_at(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
        now: u64,
    ) -> RateLimitResult {
        let result = self
            .store
            .with_entry(identifier, |data| evaluate(data, config, now));
        if !result.allowed {
            tracing::debug!(
                key = identifier,
                limit = result.limit,
                retry_after = result.retry_after,
                "rate limit exceeded"
            );
        }
        result
    }

    /// Runs both gates, then the check for `category`, keyed `"<category>:<ip>"`.
    pub fn check_request<R: RequestLike + ?Sized>(&self, request: &R, category: Category) -> Outcome {
        let gate = &self.policy.gate;
        if !gate.is_rate_limiting_enabled() {
            tracing::trace!(%category, "rate limiting disabled");
            return Outcome::Disabled;
        }

        let ip = get_client_ip(request);
        if gate.is_ip_safe_listed(&ip) {
            tracing::trace!(%category, %ip, "safe-listed caller");
            return Outcome::SafeListed;
        }

        let key = format!("{category}:{ip}");
        Outcome::Checked(self.check_rate_limit(&key, &self.policy.rule(category)))
    }

    /// Like [`RateLimiter::check_request`], with the category taken from `path`.
    pub fn check_path<R: RequestLike + ?Sized>(&self, request: &R, path: &str) -> Outcome {
        match Category::for_path(path) {
            Some(category) => self.check_request(request, category),
            None => Outcome::Unmatched,
        }
    }
}

/// Sliding window with a burst overflow. Base quota and burst share one pool of
/// `max_requests + burst_allowance`; `burst_used` only records which part was spent.
fn evaluate(data: &mut RequestData, config: &RateLimitConfig, now: u64) -> RateLimitResult {
    let window_ms = config.window_ms();
    data.prune(now.saturating_sub(window_ms));

    let oldest = data.oldest();
    let rolled_over = match oldest {
        Some(oldest) => now.saturating_sub(oldest) >= window_ms,
        None => true,
    };
    if rolled_over {
        data.burst_used = 0;
    }

    let current = u32::try_from(data.timestamps.len()).unwrap_or(u32::MAX);
    let total_allowed = config.total_allowed();
    let reset_time = match oldest {
        Some(oldest) => oldest.saturating_add(window_ms),
        None => now.saturating_add(window_ms),
    };

    if current >= total_allowed {
        let retry_after = reset_time.saturating_sub(now).div_ceil(1_000).max(1);
        return RateLimitResult {
            allowed: false,
            limit: total_allowed,
            reset_time,
            remaining: 0,
            retry_after: Some(retry_after),
        };
    }

    data.timestamps.push(now);
    let admitted = current + 1;
    if admitted > config.max_requests {
        data.burst_used += 1;
    }

    RateLimitResult {
        allowed: true,
        limit: total_allowed,
        reset_time,
        remaining: total_allowed.saturating_sub(admitted),
        retry_after: None,
    }
}
