//! Error types for the proxy boundary and the board pipeline.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Generic message returned whenever the upstream call did not succeed.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to fetch from LibreNMS";

// ---

/// Failure of a single upstream request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The client could not be built from the configured values.
    #[error("invalid upstream client configuration: {0}")]
    Config(String),

    /// Network failure, TLS failure or timeout.
    #[error("upstream unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    /// Upstream answered 2xx with a body that is not JSON.
    #[error("upstream returned an undecodable body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Every way a proxied request can end without a sanitized body.
///
/// The client only ever sees the generic `{error}` message; details are
/// logged server-side.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing endpoint")]
    MissingEndpoint,

    #[error("Server configuration missing")]
    ConfigurationMissing,

    #[error("Endpoint not allowed")]
    EndpointRejected { path: String },

    #[error("{}", UPSTREAM_FAILURE_MESSAGE)]
    Upstream(#[from] UpstreamError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            ProxyError::MissingEndpoint => StatusCode::BAD_REQUEST,
            ProxyError::EndpointRejected { .. } => StatusCode::FORBIDDEN,
            ProxyError::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream(UpstreamError::Status { status }) => {
                // Only error codes are forwarded; a bare 3xx has no Location.
                match StatusCode::from_u16(*status) {
                    Ok(code) if code.is_client_error() || code.is_server_error() => code,
                    _ => StatusCode::BAD_GATEWAY,
                }
            }
            ProxyError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();

        match &self {
            ProxyError::MissingEndpoint => {}
            ProxyError::EndpointRejected { path } => {
                warn!(path = ?path, "Blocked proxy request to unauthorized endpoint");
            }
            ProxyError::ConfigurationMissing => {
                error!("Proxy request refused: upstream host or API key not configured");
            }
            ProxyError::Upstream(e) => {
                error!(error = %e, "Proxy error");
            }
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---

/// Failure of a board-side fetch through the proxy.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch {endpoint}: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch {endpoint}: HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Failed to decode {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure to read or write the persisted board settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}
