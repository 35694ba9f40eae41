/* src/error.rs */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LimitError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("rate limiter has already been initialized")]
    AlreadyInitialized,

    #[error("rate limiter not initialized, call `init_rate_limiter!` first")]
    NotInitialized,

    #[error("the sweeper must be started from within a tokio runtime")]
    NoRuntime,
}
