//! Wiremesh master - fleet supervisor.
//!
//! Competes for the leader lease and serves the admin HTTP surface for
//! fleet introspection and message injection.
//!
//! Configuration comes from the environment; see
//! [`wiremesh_master::MasterConfig`].

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wiremesh_master::{config::MasterConfig, node};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wiremesh=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = MasterConfig::from_env();
    tracing::info!(
        port = %cfg.port,
        redis = %cfg.redis_addr,
        "master configuration loaded"
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
