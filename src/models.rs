//! Domain and wire models for the status board.
//!
//! Upstream records arrive with loosely typed fields (flags encoded as
//! booleans, integers or strings; lists either wrapped in an envelope or
//! bare). Everything is normalized here, at the ingestion boundary, so the
//! aggregation and view layers only ever see the canonical types below.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

// ---

/// Boolean-ish value as the upstream API encodes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseFlag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl LooseFlag {
    pub fn is_set(&self) -> bool {
        // ---
        match self {
            LooseFlag::Bool(b) => *b,
            LooseFlag::Int(n) => *n != 0,
            LooseFlag::Text(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
        }
    }
}

fn flag_set(flag: Option<&LooseFlag>) -> bool {
    flag.is_some_and(LooseFlag::is_set)
}

/// Parse an upstream timestamp. Accepts RFC 3339 and the backend's
/// `YYYY-MM-DD HH:MM:SS` form (UTC). Anything else yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ---

/// Device record as served by the devices endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDevice {
    pub device_id: u64,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, rename = "sysName")]
    pub sys_name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub status: Option<LooseFlag>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub disabled: Option<LooseFlag>,
    #[serde(default)]
    pub ignore: Option<LooseFlag>,
    #[serde(default)]
    pub last_polled: Option<String>,
}

/// Alert record as served by the alerts endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAlert {
    pub id: u64,
    pub device_id: u64,
    #[serde(default)]
    pub rule_id: Option<u64>,
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, rename = "sysName")]
    pub sys_name: Option<String>,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Group record as served by the device-groups list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGroup {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

/// Member entry of a device-group detail response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMember {
    pub device_id: u64,
}

// ---

/// A list response in either of the two shapes the backend produces.
#[derive(Debug, Clone)]
pub enum Listing<T> {
    /// `{ "<key>": [ ... ], ... }`
    Wrapped(Vec<T>),
    /// `[ ... ]`
    Bare(Vec<T>),
}

impl<T: DeserializeOwned> Listing<T> {
    /// Decode a listing whose wrapped form stores the records under `key`.
    ///
    /// Records that fail to decode are skipped with a debug log rather than
    /// failing the whole listing. A body with neither shape decodes to an
    /// empty wrapped listing.
    pub fn decode(body: &Value, key: &str) -> Self {
        // ---
        match body {
            Value::Array(items) => Listing::Bare(decode_items(items, key)),
            Value::Object(map) => match map.get(key) {
                Some(Value::Array(items)) => Listing::Wrapped(decode_items(items, key)),
                _ => {
                    tracing::debug!("Response missing '{}' array", key);
                    Listing::Wrapped(Vec::new())
                }
            },
            _ => {
                tracing::debug!("Response for '{}' is neither an object nor an array", key);
                Listing::Wrapped(Vec::new())
            }
        }
    }
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        // ---
        match self {
            Listing::Wrapped(items) | Listing::Bare(items) => items,
        }
    }
}

fn decode_items<T: DeserializeOwned>(items: &[Value], key: &str) -> Vec<T> {
    // ---
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<T>(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Failed to parse {} item {}: {} - Raw item: {}", key, i, e, item);
                None
            }
        })
        .collect()
}

// ---

/// Device reachability, normalized from the backend's status flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    Up,
    Down,
}

/// Alert severity class. Ordering follows precedence: `Critical` is greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Other,
    Warning,
    Critical,
}

impl Severity {
    /// Classify from the alert's state code and severity label.
    pub fn classify(state: Option<i64>, severity: Option<&str>) -> Self {
        // ---
        let label = severity.map(str::trim);
        if state == Some(1) || label.is_some_and(|s| s.eq_ignore_ascii_case("critical")) {
            Severity::Critical
        } else if state == Some(2) || label.is_some_and(|s| s.eq_ignore_ascii_case("warning")) {
            Severity::Warning
        } else {
            Severity::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: u64,
    pub hostname: String,
    pub display_name: String,
    pub ip: String,
    pub status: OperationalStatus,
    pub device_type: Option<String>,
    pub polling_disabled: bool,
    pub alerting_disabled: bool,
    pub last_polled: Option<DateTime<Utc>>,
}

impl Device {
    pub fn is_down(&self) -> bool {
        self.status == OperationalStatus::Down
    }
}

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        // ---
        let hostname = raw.hostname.unwrap_or_default();
        let display_name = non_empty(raw.sys_name).unwrap_or_else(|| hostname.clone());

        // A missing status is treated as reachable.
        let status = match &raw.status {
            Some(flag) if !flag.is_set() => OperationalStatus::Down,
            _ => OperationalStatus::Up,
        };

        Device {
            id: raw.device_id,
            hostname,
            display_name,
            ip: raw.ip.unwrap_or_default(),
            status,
            device_type: non_empty(raw.device_type),
            polling_disabled: flag_set(raw.disabled.as_ref()),
            alerting_disabled: flag_set(raw.ignore.as_ref()),
            last_polled: raw.last_polled.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: u64,
    pub device_id: u64,
    pub rule_id: Option<u64>,
    pub severity: Severity,
    pub rule: String,
    pub hostname: String,
    pub display_name: String,
    pub raised_at: Option<DateTime<Utc>>,
}

impl From<RawAlert> for Alert {
    fn from(raw: RawAlert) -> Self {
        // ---
        let severity = Severity::classify(raw.state, raw.severity.as_deref());
        let hostname = raw.hostname.unwrap_or_default();
        let display_name = non_empty(raw.sys_name).unwrap_or_else(|| hostname.clone());

        Alert {
            id: raw.id,
            device_id: raw.device_id,
            rule_id: raw.rule_id,
            severity,
            rule: raw.rule.unwrap_or_default(),
            hostname,
            display_name,
            raised_at: raw.timestamp.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceGroup {
    pub id: u64,
    pub name: String,
    pub description: String,
    /// `None` until the membership fetch for this group has succeeded.
    pub members: Option<BTreeSet<u64>>,
}

impl DeviceGroup {
    pub fn with_members(mut self, members: impl IntoIterator<Item = u64>) -> Self {
        self.members = Some(members.into_iter().collect());
        self
    }

    pub fn contains(&self, device_id: u64) -> bool {
        self.members
            .as_ref()
            .is_some_and(|m| m.contains(&device_id))
    }
}

impl From<RawGroup> for DeviceGroup {
    fn from(raw: RawGroup) -> Self {
        DeviceGroup {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            description: raw.desc.unwrap_or_default(),
            members: None,
        }
    }
}

/// A device joined with its highest-precedence alert for the current cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedDevice {
    #[serde(flatten)]
    pub device: Device,
    pub active_alert: Option<Alert>,
}

impl AggregatedDevice {
    pub fn is_down(&self) -> bool {
        self.device.is_down()
    }

    pub fn has_alert(&self) -> bool {
        self.active_alert.is_some()
    }
}
