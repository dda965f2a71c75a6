//! Router configuration for the admin HTTP surface.
//!
//! # Routes
//!
//! - `GET /healthz` - store ping plus this candidate's lease state
//! - `GET /minions` - JSON array of every live minion
//! - `GET /minions/{id}` - one minion's registry entry
//! - `POST /minions/{id}/send` - push the raw body onto that minion's
//!   master inbox
//! - `POST /broadcast` - push the raw body onto every minion's master
//!   inbox, transactionally
//!
//! Handler failures, including the typed not-found error, answer HTTP 500
//! with a text body.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use wiremesh_store::Store;

use crate::error::AdminError;
use crate::lease::Lease;
use crate::registry::{Minion, Registry};

/// Maximum admin request body size in bytes.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state for the admin surface.
#[derive(Clone)]
pub struct AppState {
    /// The shared store.
    pub store: Store,
    /// Fleet registry client.
    pub registry: Registry,
    /// This candidate's lease view.
    pub lease: Arc<Lease>,
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    master: bool,
}

/// Create the admin router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/minions", get(list_minions))
        .route("/minions/{id}", get(get_minion))
        .route("/minions/{id}/send", post(send_message))
        .route("/broadcast", post(broadcast))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Store ping plus lease state.
async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, AdminError> {
    state.store.ping().await?;
    Ok(Json(HealthResponse {
        status: "healthy",
        master: state.lease.is_master().await,
    }))
}

/// List every live minion.
async fn list_minions(State(state): State<AppState>) -> Result<Json<Vec<Minion>>, AdminError> {
    Ok(Json(state.registry.list().await?))
}

/// Get one minion by id.
async fn get_minion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Minion>, AdminError> {
    Ok(Json(state.registry.get(&id).await?))
}

/// Push the raw request body onto one minion's master inbox.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    state.registry.send(&id, &body).await?;
    Ok(StatusCode::OK)
}

/// Push the raw request body onto every minion's master inbox.
async fn broadcast(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AdminError> {
    state.registry.broadcast(&body).await?;
    Ok(StatusCode::OK)
}
