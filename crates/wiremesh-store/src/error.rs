//! Error types for the coordination store.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The configured store address could not be parsed.
    #[error("invalid store address: {0}")]
    InvalidAddress(String),
}

impl StoreError {
    /// Returns `true` if this error might be resolved by retrying.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Redis(err) => err.is_io_error() || err.is_timeout() || err.is_cluster_error(),
            Self::InvalidAddress(_) => false,
        }
    }
}
