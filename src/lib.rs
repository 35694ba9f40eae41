/* src/lib.rs */

//! In-memory sliding-window rate limiting for the club platform API.
//!
//! Each caller gets `max_requests + burst_allowance` requests per sliding
//! window, per endpoint category. State lives in one process and is lost on
//! restart. A background sweep drops callers idle for an hour; without it
//! (e.g. a limiter built with [`RateLimiter::new`] and never started) the map
//! only grows.

use error::Result;
use once_cell::sync::OnceCell;

mod config;
mod error;
mod gate;
mod gc;
mod ip;
mod limiter;
#[cfg(feature = "axum")]
pub mod middleware;
mod store;
mod types;

pub use config::*;
pub use error::LimitError;
pub use gate::*;
pub use ip::*;
pub use limiter::*;
pub use store::*;
pub use types::*;

// Global rate limiter instance, initialized once.
static GLOBAL_LIMITER: OnceCell<RateLimiter> = OnceCell::new();

/// Initialize the process-wide rate limiter, from the environment or from an explicit policy.
/// Must run inside a tokio runtime, which hosts the sweep.
///
/// # Examples
///
/// ```rust,ignore
/// use padel_limit::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), LimitError> {
///     init_rate_limiter!()?;
///     // or
///     init_rate_limiter!(PolicyTable::from_env().with_rule(
///         Category::Lead,
///         RateLimitConfig::new(Duration::minutes(1), 3).with_burst(1),
///     ))?;
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! init_rate_limiter {
    () => {
        $crate::initialize_limiter($crate::PolicyTable::from_env())
    };
    ($policy:expr) => {
        $crate::initialize_limiter($policy)
    };
}

/// Check a request against the process-wide limiter, by path or by category.
///
/// Fails with [`LimitError::NotInitialized`] before `init_rate_limiter!`.
#[macro_export]
macro_rules! limit {
    ($request:expr, category: $category:expr) => {
        $crate::check_limit_category($request, $category)
    };
    ($request:expr, $path:expr) => {
        $crate::check_limit($request, $path)
    };
}

/// Initialize the global rate limiter. Should be called only once.
pub fn initialize_limiter(policy: PolicyTable) -> Result<()> {
    if GLOBAL_LIMITER.get().is_some() {
        return Err(LimitError::AlreadyInitialized);
    }
    let limiter = RateLimiter::start(policy)?;
    GLOBAL_LIMITER.set(limiter).map_err(|limiter| {
        limiter.shutdown();
        LimitError::AlreadyInitialized
    })?;
    tracing::info!("global rate limiter initialized");
    Ok(())
}

pub fn global_limiter() -> Result<&'static RateLimiter> {
    GLOBAL_LIMITER.get().ok_or(LimitError::NotInitialized)
}

/// Check a request, choosing the category from its path.
pub fn check_limit<R: RequestLike + ?Sized>(request: &R, path: &str) -> Result<Outcome> {
    Ok(global_limiter()?.check_path(request, path))
}

pub fn check_limit_category<R: RequestLike + ?Sized>(
    request: &R,
    category: Category,
) -> Result<Outcome> {
    Ok(global_limiter()?.check_request(request, category))
}
