//! Board-side client for the proxy.
//!
//! Every call goes through `GET <proxy>?endpoint=...`; the board never talks
//! to the upstream backend directly and never holds its token.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::PipelineError;
use crate::guard::{Endpoint, INFO_SENTINEL};
use crate::models::{
    Alert, Device, DeviceGroup, Listing, RawAlert, RawDevice, RawGroup, RawMember,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    base_url: Option<String>,
}

// ---

#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    proxy_url: Url,
}

impl ProxyClient {
    pub fn new(proxy_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        // ---
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, proxy_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, proxy_url: Url) -> Self {
        Self { http, proxy_url }
    }

    fn url_for(&self, endpoint: &str) -> Url {
        let mut url = self.proxy_url.clone();
        url.query_pairs_mut().append_pair("endpoint", endpoint);
        url
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value, PipelineError> {
        // ---
        let url = self.url_for(endpoint);
        debug!("Fetching {}", url);

        let response =
            self.http
                .get(url)
                .send()
                .await
                .map_err(|source| PipelineError::Request {
                    endpoint: endpoint.to_string(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| PipelineError::Decode {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    pub async fn alerts(&self) -> Result<Vec<Alert>, PipelineError> {
        // ---
        let body = self.get_json(&Endpoint::Alerts.path()).await?;
        Ok(Listing::<RawAlert>::decode(&body, "alerts")
            .into_items()
            .into_iter()
            .map(Alert::from)
            .collect())
    }

    pub async fn devices(&self) -> Result<Vec<Device>, PipelineError> {
        // ---
        let body = self.get_json(&Endpoint::Devices.path()).await?;
        Ok(Listing::<RawDevice>::decode(&body, "devices")
            .into_items()
            .into_iter()
            .map(Device::from)
            .collect())
    }

    /// Group list without membership.
    pub async fn groups(&self) -> Result<Vec<DeviceGroup>, PipelineError> {
        // ---
        let body = self.get_json(&Endpoint::DeviceGroups.path()).await?;
        Ok(Listing::<RawGroup>::decode(&body, "groups")
            .into_items()
            .into_iter()
            .map(DeviceGroup::from)
            .collect())
    }

    /// Member device ids of one group.
    pub async fn group_members(&self, group_id: u64) -> Result<Vec<u64>, PipelineError> {
        // ---
        let body = self
            .get_json(&Endpoint::DeviceGroup(group_id).path())
            .await?;
        Ok(Listing::<RawMember>::decode(&body, "devices")
            .into_items()
            .into_iter()
            .map(|m| m.device_id)
            .collect())
    }

    /// Upstream base URL for deep links, if the proxy reports one.
    pub async fn base_url(&self) -> Result<Option<String>, PipelineError> {
        // ---
        let body = self.get_json(INFO_SENTINEL).await?;
        let info: InfoResponse =
            serde_json::from_value(body).unwrap_or(InfoResponse { base_url: None });
        Ok(info.base_url.filter(|u| !u.is_empty()))
    }
}
