//! Authenticated client for the upstream monitoring API.
//!
//! Holds the server-side secret and is only ever reached through the proxy
//! handler, after the endpoint guard has accepted the request.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::error::UpstreamError;
use crate::guard::{Endpoint, API_PREFIX};

/// Header carrying the static API token.
const AUTH_HEADER: HeaderName = HeaderName::from_static("x-auth-token");

// ---

/// Upstream reply: status code plus decoded JSON body.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Build a client for `base_url` with a bounded per-request timeout.
    ///
    /// The token is installed as a sensitive default header, so it is sent
    /// with every request and redacted from `Debug` output. A 3xx answer is
    /// returned as [`UpstreamError::Status`].
    pub fn new(
        base_url: &str,
        token: &SecretString,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        // ---
        let mut auth = HeaderValue::from_str(token.expose_secret())
            .map_err(|_| UpstreamError::Config("API token is not a valid header value".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(AUTH_HEADER, auth);

        // Redirects are never followed: the token header would go to
        // whichever host `Location` names.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .default_headers(headers)
            .build()
            .map_err(|e| UpstreamError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: trim_base_url(base_url).to_string(),
        })
    }

    /// Base URL without trailing slash, as handed to the board for deep links.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, endpoint.path())
    }

    /// Fetch `endpoint` and decode its JSON body.
    pub async fn fetch(&self, endpoint: &Endpoint) -> Result<RawResponse, UpstreamError> {
        // ---
        let url = self.url_for(endpoint);
        debug!("Fetching upstream: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(UpstreamError::Unavailable)?;

        let status = response.status();
        if !status.is_success() {
            debug!("Upstream {} answered HTTP {}", endpoint, status.as_u16());
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(UpstreamError::Decode)?;

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Strip a single trailing slash from a configured base URL.
pub fn trim_base_url(base_url: &str) -> &str {
    base_url.trim().strip_suffix('/').unwrap_or(base_url.trim())
}
