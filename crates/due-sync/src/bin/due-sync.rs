//! due-sync service binary.
//!
//! Standalone HTTP service that reconciles work order due dates on webhook.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use due_sync::{config::Config, server};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting due-sync service...");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        endpoint = %config.endpoint_domain,
        policy = ?config.policy,
        timeout_secs = config.request_timeout.as_secs(),
        "Configuration loaded"
    );

    // Build application state and router
    let state = server::AppState::from_config(&config)?;
    let app = server::build_router(state);

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = config.port, "due-sync service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("due-sync service stopped");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("due_sync=info,tower_http=info"))?;

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
