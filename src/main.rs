//! Application entry point for the `nms-statusboard` proxy server.
//!
//! This binary orchestrates the startup sequence for the proxy, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Mounting the proxy and health routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests until Ctrl-C
//!
//! # Environment Variables
//! - `LIBRENMS_HOST` – upstream base URL (proxied requests fail without it)
//! - `LIBRENMS_API_KEY` – upstream API token (proxied requests fail without it)
//! - `LISTEN_ADDR` (optional) – bind address (default: `0.0.0.0:8080`)
//! - `UPSTREAM_TIMEOUT_SECS` (optional) – upstream timeout (default: 15)
//! - `STATUSBOARD_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `STATUSBOARD_SPAN_EVENTS` (optional) – span event mode for tracing
use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;

use nms_statusboard::{config, logging, routes};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    logging::init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    // Build app from routes gateway
    let app: Router = routes::router(&cfg);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", cfg.listen_addr, e))?;
    tracing::info!("Listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Proxy shutting down");
        })
        .await?;

    Ok(())
}
