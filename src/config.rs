//! Configuration loader for the `nms-statusboard` proxy and board client.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Both binaries read their settings exactly once at
//! startup; the resulting structs are immutable for the life of the process.
//!
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use secrecy::SecretString;
use url::Url;

/// Parse an optional environment variable into `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an environment variable, treating empty values as unset.
fn optional_env(var_name: &str) -> Option<String> {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---

/// Proxy server configuration.
///
/// The upstream host and token are deliberately optional: a deployment that
/// lacks them still starts, and every proxied request answers with a generic
/// configuration error instead.
#[derive(Debug)]
pub struct Config {
    // ---
    /// Upstream monitoring backend base URL (`LIBRENMS_HOST`).
    pub nms_host: Option<String>,

    /// Upstream API token (`LIBRENMS_API_KEY`). Never logged.
    pub nms_token: Option<SecretString>,

    /// Socket address the proxy listens on.
    pub listen_addr: SocketAddr,

    /// Per-request timeout for upstream calls.
    pub upstream_timeout: Duration,
}

/// Load proxy configuration from environment variables with defaults.
///
/// Optional:
/// - `LIBRENMS_HOST` – upstream base URL
/// - `LIBRENMS_API_KEY` – upstream API token
/// - `LISTEN_ADDR` – bind address (default: `0.0.0.0:8080`)
/// - `UPSTREAM_TIMEOUT_SECS` – upstream request timeout (default: 15)
///
/// Returns an error only if a provided value is malformed.
pub fn load_from_env() -> Result<Config> {
    // ---
    let nms_host = optional_env("LIBRENMS_HOST");
    let nms_token = optional_env("LIBRENMS_API_KEY").map(SecretString::from);
    let listen_addr = parse_env!("LISTEN_ADDR", SocketAddr, SocketAddr::from(([0, 0, 0, 0], 8080)));
    let timeout_secs = parse_env!("UPSTREAM_TIMEOUT_SECS", u64, 15);

    Ok(Config {
        nms_host,
        nms_token,
        listen_addr,
        upstream_timeout: Duration::from_secs(timeout_secs),
    })
}

impl Config {
    /// Whether both upstream settings are present.
    pub fn is_complete(&self) -> bool {
        self.nms_host.is_some() && self.nms_token.is_some()
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// The API token is never printed; only its presence is reported.
    pub fn log_config(&self) {
        // ---
        let token_state = if self.nms_token.is_some() {
            "****"
        } else {
            "<unset>"
        };

        tracing::info!("Configuration loaded:");
        tracing::info!(
            "  LIBRENMS_HOST         : {}",
            self.nms_host.as_deref().unwrap_or("<unset>")
        );
        tracing::info!("  LIBRENMS_API_KEY      : {}", token_state);
        tracing::info!("  LISTEN_ADDR           : {}", self.listen_addr);
        tracing::info!("  UPSTREAM_TIMEOUT_SECS : {}", self.upstream_timeout.as_secs());

        if !self.is_complete() {
            tracing::error!(
                "Missing server configuration: LIBRENMS_HOST or LIBRENMS_API_KEY; \
                 proxied requests will fail until both are set"
            );
        }
    }
}

// ---

/// Board client configuration.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    // ---
    /// Full URL of the proxy endpoint, e.g. `http://localhost:8080/proxy`.
    pub proxy_url: Url,

    /// Interval between poll cycles.
    pub poll_interval: Duration,

    /// Maximum number of group-membership fetches in flight per cycle.
    pub group_concurrency: usize,

    /// Location of the persisted board settings record.
    pub settings_path: PathBuf,

    /// Initial view as a URL query string (`type=...&sort=...`).
    pub initial_view: String,

    /// Per-request timeout for proxy calls.
    pub proxy_timeout: Duration,
}

/// Load board client configuration from environment variables with defaults.
///
/// Required:
/// - `PROXY_URL` – URL of the proxy endpoint
///
/// Optional:
/// - `POLL_INTERVAL_SECS` – seconds between cycles (default: 60)
/// - `GROUP_FETCH_CONCURRENCY` – parallel membership fetches (default: 8)
/// - `BOARD_SETTINGS_PATH` – settings file (default: `statusboard.json`)
/// - `BOARD_VIEW` – initial view query string (default: empty)
/// - `PROXY_TIMEOUT_SECS` – proxy request timeout (default: 15)
pub fn load_board_from_env() -> Result<BoardConfig> {
    // ---
    let proxy_url = require_env!("PROXY_URL");
    let proxy_url =
        Url::parse(&proxy_url).map_err(|e| anyhow!("Invalid PROXY_URL '{}': {}", proxy_url, e))?;
    let poll_secs = parse_env!("POLL_INTERVAL_SECS", u64, 60);
    let group_concurrency = parse_env!("GROUP_FETCH_CONCURRENCY", usize, 8);
    let settings_path = optional_env("BOARD_SETTINGS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("statusboard.json"));
    let initial_view = optional_env("BOARD_VIEW").unwrap_or_default();
    let timeout_secs = parse_env!("PROXY_TIMEOUT_SECS", u64, 15);

    if poll_secs == 0 {
        return Err(anyhow!("POLL_INTERVAL_SECS must be greater than zero"));
    }

    Ok(BoardConfig {
        proxy_url,
        poll_interval: Duration::from_secs(poll_secs),
        group_concurrency: group_concurrency.max(1),
        settings_path,
        initial_view,
        proxy_timeout: Duration::from_secs(timeout_secs),
    })
}

impl BoardConfig {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Board configuration loaded:");
        tracing::info!("  PROXY_URL               : {}", self.proxy_url);
        tracing::info!("  POLL_INTERVAL_SECS      : {}", self.poll_interval.as_secs());
        tracing::info!("  GROUP_FETCH_CONCURRENCY : {}", self.group_concurrency);
        tracing::info!("  BOARD_SETTINGS_PATH     : {}", self.settings_path.display());
        tracing::info!("  BOARD_VIEW              : {}", self.initial_view);
        tracing::info!("  PROXY_TIMEOUT_SECS      : {}", self.proxy_timeout.as_secs());
    }
}
