//! Beneficiary priority scoring service entry point

use anyhow::{Context, Result};
use pmajay_scoring_service::{build_state, create_router, ServiceConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Beneficiary Priority Service v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    let state = build_state(&config).map_err(|e| {
        error!("Failed to load serving artifacts: {}", e);
        e
    })?;

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Scoring server terminated unexpectedly")?;

    info!("Service shutdown complete");
    Ok(())
}

fn init_logging() {
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(env)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }
}
