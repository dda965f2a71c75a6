//! Router configuration for the minion HTTP surface.
//!
//! # Routes
//!
//! - `GET /healthz` - liveness check; succeeds iff this node's registry
//!   entry exists
//! - `GET /ws` - authenticated socket upgrade, handed to the hub

use std::collections::HashMap;

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::client;
use crate::error::ApiError;
use crate::state::AppState;

/// Create the minion router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness check: this node is healthy iff its own registry entry exists.
async fn healthz(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    if state.registry.exists(&state.minion_key).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::MinionNotFound)
    }
}

/// Socket upgrade: authenticate the bearer token, enforce the connection
/// ceiling, then hand the socket to a client task.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers, &query).ok_or(ApiError::Unauthorized)?;
    let client_id = state.verifier.verify(token)?;

    if state.hub.connection_count() >= state.max_connections {
        return Err(ApiError::TooManyConnections);
    }

    tracing::debug!(client_id = %client_id, "socket upgrade accepted");

    let hub = state.hub.clone();
    let presence = state.presence.clone();

    Ok(ws
        .max_message_size(state.max_message_size)
        .write_buffer_size(client::WRITE_BUFFER_SIZE)
        .on_upgrade(move |socket| client::serve(socket, client_id, hub, presence)))
}

/// Extract the bearer token from the `Authorization` header, falling back
/// to the `token` query parameter for browser WebSocket clients, which
/// cannot set headers on the upgrade request.
fn bearer_token<'a>(
    headers: &'a HeaderMap,
    query: &'a HashMap<String, String>,
) -> Option<&'a str> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .or_else(|| query.get("token").map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());

        let empty_query = HashMap::new();
        let token = bearer_token(&headers, &empty_query);
        assert_eq!(token, Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_from_query_fallback() {
        let query = HashMap::from([("token".to_string(), "abc.def.ghi".to_string())]);

        let empty_headers = HeaderMap::new();
        let token = bearer_token(&empty_headers, &query);
        assert_eq!(token, Some("abc.def.ghi"));
    }

    #[test]
    fn header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer from-header".parse().unwrap());
        let query = HashMap::from([("token".to_string(), "from-query".to_string())]);

        assert_eq!(bearer_token(&headers, &query), Some("from-header"));
    }

    #[test]
    fn missing_token() {
        assert_eq!(bearer_token(&HeaderMap::new(), &HashMap::new()), None);
    }

    #[test]
    fn malformed_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());

        assert_eq!(bearer_token(&headers, &HashMap::new()), None);
    }
}
