//! Minion node lifecycle.
//!
//! A minion joins the cluster by writing its registry hash with a TTL, then
//! keeps itself alive by re-extending that TTL every check-in period. If the
//! node dies, the key expires and the fleet treats the node as gone. The
//! whole lifecycle runs under one cancellation token: signal, HTTP
//! shutdown, hub teardown, and registry cleanup happen in order, exactly
//! once.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use wiremesh_auth::TokenVerifier;
use wiremesh_core::MinionId;
use wiremesh_store::{keys, Store};

use crate::config::MinionConfig;
use crate::error::NodeError;
use crate::hub::Hub;
use crate::routes::create_router;
use crate::state::AppState;

/// Time (in seconds) until an unrefreshed registry entry expires.
const NODE_KEY_EXPIRES: i64 = 10;

/// How often the check-in loop re-extends the registry TTL.
const CHECKIN_PERIOD: Duration = Duration::from_secs(5);

/// Run a minion node until the shutdown token fires.
///
/// # Errors
///
/// Returns an error if startup fails (store join, listener bind) or the
/// HTTP server aborts.
pub async fn run(cfg: MinionConfig, shutdown: CancellationToken) -> Result<(), NodeError> {
    let minion_id = MinionId::generate();
    tracing::info!(minion_id = %minion_id, "starting minion node");

    let broker = Store::connect(&cfg.redis_broker_addr).await?;
    let registry = if cfg.redis_registrar_addr == cfg.redis_broker_addr {
        broker.clone()
    } else {
        Store::connect(&cfg.redis_registrar_addr).await?
    };
    tracing::info!("connected to store");

    let minion_key = keys::minion_key(&cfg.minion_key_prefix, &minion_id.to_string());

    let (hub, hub_handle) = Hub::new(
        &minion_id,
        broker,
        registry.clone(),
        minion_key.clone(),
        shutdown.clone(),
    );
    let presence = hub.presence();
    let hub_task = hub.start().await.map_err(NodeError::Store)?;

    join(&registry, &minion_key, &cfg).await?;
    let checkin_task = tokio::spawn(checkin_loop(
        registry.clone(),
        minion_key.clone(),
        shutdown.clone(),
    ));

    let state = AppState {
        minion_id,
        minion_key: minion_key.clone(),
        registry: registry.clone(),
        hub: hub_handle,
        presence,
        verifier: Arc::new(TokenVerifier::new(&cfg.secret)),
        max_connections: cfg.max_connections,
        max_message_size: cfg.max_message_size,
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr()).await?;
    tracing::info!(addr = %cfg.listen_addr(), "minion listening");

    let serve_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await;

    // Cleanup runs exactly once, whether we got here by signal or by a
    // server error. Cancelling an already-cancelled token is a no-op.
    shutdown.cancel();
    let _ = checkin_task.await;
    let _ = hub_task.await;
    leave(&registry, &minion_key).await;
    tracing::info!(minion_id = %minion_id, "minion node stopped");

    served?;
    Ok(())
}

/// Join the cluster: one transaction writes the registry hash and sets its
/// TTL.
async fn join(registry: &Store, minion_key: &str, cfg: &MinionConfig) -> Result<(), NodeError> {
    registry
        .hset_with_expire(
            minion_key,
            &[
                (keys::FIELD_IP, cfg.external_ip.clone()),
                (keys::FIELD_PORT, cfg.port.clone()),
                (keys::FIELD_CONNECTIONS, "0".to_string()),
            ],
            NODE_KEY_EXPIRES,
        )
        .await?;

    tracing::info!(key = %minion_key, "joined cluster");
    Ok(())
}

/// Leave the cluster by deleting the registry entry.
async fn leave(registry: &Store, minion_key: &str) {
    if let Err(err) = registry.del(minion_key).await {
        tracing::error!(key = %minion_key, error = %err, "failed to leave cluster");
    } else {
        tracing::info!(key = %minion_key, "left cluster");
    }
}

/// Keep the node alive by re-extending the registry TTL. A failed check-in
/// logs and continues; if the node really is gone, the TTL reaps it.
async fn checkin_loop(registry: Store, minion_key: String, shutdown: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + CHECKIN_PERIOD, CHECKIN_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                match registry.expire(&minion_key, NODE_KEY_EXPIRES).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(key = %minion_key, "node key missing at check-in");
                    }
                    Err(err) => {
                        tracing::warn!(key = %minion_key, error = %err, "check-in failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkin_refreshes_before_expiry() {
        assert!(CHECKIN_PERIOD.as_secs() < u64::try_from(NODE_KEY_EXPIRES).unwrap());
    }
}
