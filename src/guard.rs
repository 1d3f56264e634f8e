//! Endpoint whitelist for the proxy.
//!
//! Only four upstream endpoint shapes may ever be reached through the proxy.
//! A requested path is normalized and then matched against three exact paths
//! and one pattern (group detail by strictly numeric id). Everything else is
//! rejected before any upstream request is issued.

use std::{fmt, sync::LazyLock};

use regex::Regex;

/// Sentinel endpoint answered by the proxy itself with the upstream base URL.
pub const INFO_SENTINEL: &str = "__info__";

/// Path prefix of the upstream REST API. Callers may include or omit it.
pub const API_PREFIX: &str = "/api/v0";

static GROUP_DETAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/devicegroups/(\d+)$").expect("group detail pattern is valid")
});

// ---

/// An upstream endpoint that passed the whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Alerts,
    Devices,
    DeviceGroups,
    DeviceGroup(u64),
}

impl Endpoint {
    /// Normalize `raw` and match it against the whitelist.
    pub fn parse(raw: &str) -> Option<Self> {
        // ---
        let path = normalize(raw)?;

        match path.as_str() {
            "/alerts" => Some(Endpoint::Alerts),
            "/devices" => Some(Endpoint::Devices),
            "/devicegroups" => Some(Endpoint::DeviceGroups),
            other => GROUP_DETAIL
                .captures(other)
                .and_then(|caps| caps.get(1))
                .and_then(|id| id.as_str().parse::<u64>().ok())
                .map(Endpoint::DeviceGroup),
        }
    }

    /// Path relative to the API prefix, always with one leading slash.
    pub fn path(&self) -> String {
        // ---
        match self {
            Endpoint::Alerts => "/alerts".to_string(),
            Endpoint::Devices => "/devices".to_string(),
            Endpoint::DeviceGroups => "/devicegroups".to_string(),
            Endpoint::DeviceGroup(id) => format!("/devicegroups/{id}"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Whether `raw` names one of the whitelisted endpoints.
pub fn is_allowed(raw: &str) -> bool {
    Endpoint::parse(raw).is_some()
}

/// Ensure exactly one leading slash and strip the optional API prefix.
///
/// Returns `None` for an empty path.
pub fn normalize(raw: &str) -> Option<String> {
    // ---
    let trimmed = raw.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let path = format!("/{trimmed}");
    match path.strip_prefix(API_PREFIX) {
        Some(rest) if rest.starts_with('/') => Some(rest.to_string()),
        _ => Some(path),
    }
}
