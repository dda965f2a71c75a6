//! Master node lifecycle.
//!
//! Connect to the store, spawn the two lease loops, and serve the admin
//! surface until the shutdown token fires. Cleanup is once-only: cancel,
//! await the loops, done. A held lease is deliberately not released on
//! shutdown; it expires on its own TTL and the next candidate picks it up.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use wiremesh_store::Store;

use crate::config::MasterConfig;
use crate::error::NodeError;
use crate::lease::{run_maintain_loop, run_upgrade_loop, Lease};
use crate::registry::Registry;
use crate::routes::{create_router, AppState};

/// Run a master candidate until the shutdown token fires.
///
/// # Errors
///
/// Returns an error if startup fails (store connect, listener bind) or the
/// HTTP server aborts.
pub async fn run(cfg: MasterConfig, shutdown: CancellationToken) -> Result<(), NodeError> {
    tracing::info!("starting master node");

    let store = Store::connect(&cfg.redis_addr).await?;
    tracing::info!("connected to store");

    let lease = Arc::new(Lease::new());
    let upgrade_task = tokio::spawn(run_upgrade_loop(
        Arc::clone(&lease),
        store.clone(),
        shutdown.clone(),
    ));
    let maintain_task = tokio::spawn(run_maintain_loop(
        Arc::clone(&lease),
        store.clone(),
        shutdown.clone(),
    ));

    let state = AppState {
        store: store.clone(),
        registry: Registry::new(store, cfg.minion_key_prefix.clone()),
        lease,
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr()).await?;
    tracing::info!(addr = %cfg.listen_addr(), "master listening");

    let serve_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await;

    shutdown.cancel();
    let _ = upgrade_task.await;
    let _ = maintain_task.await;
    tracing::info!("master node stopped");

    served?;
    Ok(())
}
