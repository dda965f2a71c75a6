//! Error types for the master node.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use wiremesh_store::StoreError;

/// Errors surfaced by the admin HTTP handlers.
///
/// The admin contract reports every failure, including the typed not-found
/// error, as HTTP 500 with a text body.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The requested minion does not exist in the registry.
    #[error("could not find the requested minion")]
    MinionNotFound,

    /// Store layer error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "admin request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Errors that can abort the master node lifecycle.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Store layer error during startup.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The HTTP listener could not be bound or serving failed.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
