//! Route gateway for the proxy server.
//!
//! `main.rs` only calls [`router`]; individual endpoints live in sibling
//! modules and export a subrouter each.

use std::sync::Arc;

use axum::Router;

use crate::{Config, UpstreamClient};

mod health;
mod proxy;

pub use proxy::handle;

// ---

/// Shared, read-only state for all routes.
///
/// `upstream` is `None` when the deployment lacks the upstream host or
/// token; the proxy then refuses every request with a configuration error.
#[derive(Clone, Default)]
pub struct AppState {
    pub upstream: Option<Arc<UpstreamClient>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        // ---
        let (Some(host), Some(token)) = (config.nms_host.as_deref(), config.nms_token.as_ref())
        else {
            return Self::default();
        };

        match UpstreamClient::new(host, token, config.upstream_timeout) {
            Ok(client) => Self {
                upstream: Some(Arc::new(client)),
            },
            Err(e) => {
                tracing::error!("Failed to initialize upstream client: {}", e);
                Self::default()
            }
        }
    }
}

pub fn router(config: &Config) -> Router {
    // ---
    Router::new()
        .merge(proxy::router())
        .merge(health::router())
        .with_state(AppState::from_config(config))
}
