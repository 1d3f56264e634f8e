use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::AppState;
use crate::error::ProxyError;
use crate::guard::{self, Endpoint, INFO_SENTINEL};
use crate::sanitize::sanitize;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/proxy", get(handler))
}

/// Query parameters accepted by `GET /proxy`.
#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    endpoint: Option<String>,
}

async fn handler(
    Query(params): Query<ProxyQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    match handle(&state, params.endpoint.as_deref()).await {
        Ok((status, body)) => (status, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// One stateless request/response cycle of the proxy.
///
/// Each step may end the cycle: missing endpoint, missing configuration,
/// the info sentinel, a guard rejection, and finally the upstream call.
pub async fn handle(
    state: &AppState,
    endpoint: Option<&str>,
) -> Result<(StatusCode, Value), ProxyError> {
    // ---
    let endpoint = endpoint
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(ProxyError::MissingEndpoint)?;

    let upstream = state
        .upstream
        .as_deref()
        .ok_or(ProxyError::ConfigurationMissing)?;

    if endpoint == INFO_SENTINEL {
        debug!("GET /proxy - info sentinel");
        return Ok((StatusCode::OK, json!({ "baseUrl": upstream.base_url() })));
    }

    let target = Endpoint::parse(endpoint).ok_or_else(|| ProxyError::EndpointRejected {
        path: guard::normalize(endpoint).unwrap_or_default(),
    })?;

    info!("GET /proxy - {}", target);

    let raw = upstream.fetch(&target).await?;
    let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::OK);

    Ok((status, sanitize(&target, raw.body)))
}
