//! Common error types for wiremesh.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared across the wiremesh crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Envelope encoding failed.
    #[error("envelope encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Envelope decoding failed.
    #[error("envelope decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),
}
