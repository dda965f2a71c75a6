//! Error types for the minion node.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use wiremesh_store::StoreError;

/// Errors surfaced by the minion HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// The per-minion connection ceiling has been reached.
    #[error("connection limit reached")]
    TooManyConnections,

    /// This minion's own registry entry is missing.
    #[error("could not find the requested minion")]
    MinionNotFound,

    /// Store layer error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::TooManyConnections => StatusCode::SERVICE_UNAVAILABLE,
            Self::MinionNotFound | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

impl From<wiremesh_auth::AuthError> for ApiError {
    fn from(_: wiremesh_auth::AuthError) -> Self {
        Self::Unauthorized
    }
}

/// Errors that can abort the minion node lifecycle.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Store layer error during startup or shutdown.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The HTTP listener could not be bound or serving failed.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::TooManyConnections.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::MinionNotFound.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
