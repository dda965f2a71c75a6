//! Wiremesh minion - client-facing messaging node.
//!
//! Terminates client WebSocket connections, routes envelopes between local
//! clients, and forwards cross-minion traffic through the shared store.
//!
//! Configuration comes from the environment; see
//! [`wiremesh_minion::MinionConfig`].

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wiremesh_minion::{node, MinionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wiremesh=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = MinionConfig::from_env();
    tracing::info!(
        port = %cfg.port,
        external_ip = %cfg.external_ip,
        broker = %cfg.redis_broker_addr,
        registrar = %cfg.redis_registrar_addr,
        max_connections = cfg.max_connections,
        "minion configuration loaded"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    node::run(cfg, shutdown).await?;
    Ok(())
}

/// Cancel the token on SIGINT or SIGTERM. Later signals are no-ops; the
/// handlers stay installed but nothing polls them again.
async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
