//! Filter, sort and view state for the board.
//!
//! [`ViewState`] is always exactly reconstructible from URL query parameters.
//! The mapping is canonical: a field at its default value is absent from the
//! URL, so the all-defaults view has no query string at all.

use std::borrow::Cow;
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::{form_urlencoded, Url};

use crate::models::{AggregatedDevice, DeviceGroup};

const PARAM_TYPE: &str = "type";
const PARAM_GROUP: &str = "group";
const PARAM_SORT: &str = "sort";
const PARAM_DOWN: &str = "down";
const ALL: &str = "all";

// ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Down first, then alerting, then by id.
    #[default]
    Status,
    Name,
    Id,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Status => "status",
            SortKey::Name => "name",
            SortKey::Id => "id",
        }
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(SortKey::Status),
            "name" => Ok(SortKey::Name),
            "id" => Ok(SortKey::Id),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter and sort selections. `None` filters mean "all".
///
/// Fields only change through the setters, which normalize exactly as
/// [`ViewState::from_query`] does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    filter_type: Option<String>,
    filter_group: Option<String>,
    sort: SortKey,
    down_only: bool,
}

/// Map the UI's explicit "all" (or nothing) onto the default.
fn selection(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty() && value != ALL).then(|| value.to_string())
}

impl ViewState {
    /// Rebuild a view from a query string (with or without leading `?`).
    ///
    /// Unknown parameters are ignored; an unknown sort value falls back to
    /// the default. A repeated parameter keeps its first value.
    pub fn from_query(query: &str) -> Self {
        // ---
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = ViewState::default();
        let mut seen: Vec<Cow<'_, str>> = Vec::new();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            // First occurrence wins
            if seen.contains(&key) {
                continue;
            }
            seen.push(key.clone());

            match key.as_ref() {
                PARAM_TYPE => state.filter_type = selection(&value),
                PARAM_GROUP => state.filter_group = selection(&value),
                PARAM_SORT => state.sort = value.parse().unwrap_or_default(),
                PARAM_DOWN => state.down_only = value == "true",
                _ => {}
            }
        }
        state
    }

    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or_default())
    }

    /// Non-default fields as ordered query pairs.
    fn params(&self) -> Vec<(&'static str, String)> {
        // ---
        let mut params = Vec::new();
        if let Some(t) = &self.filter_type {
            params.push((PARAM_TYPE, t.clone()));
        }
        if let Some(g) = &self.filter_group {
            params.push((PARAM_GROUP, g.clone()));
        }
        if self.sort != SortKey::default() {
            params.push((PARAM_SORT, self.sort.to_string()));
        }
        if self.down_only {
            params.push((PARAM_DOWN, "true".to_string()));
        }
        params
    }

    /// Canonical query string without leading `?`; empty for the default view.
    pub fn to_query(&self) -> String {
        // ---
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params())
            .finish()
    }

    /// Return `url` with this view's parameters replacing any previous ones.
    ///
    /// Parameters the view does not own are kept in their original order.
    /// When nothing remains the query is removed entirely.
    pub fn apply_to_url(&self, url: &Url) -> Url {
        // ---
        let owned = [PARAM_TYPE, PARAM_GROUP, PARAM_SORT, PARAM_DOWN];
        let foreign: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !owned.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut pairs = form_urlencoded::Serializer::new(String::new());
        pairs.extend_pairs(foreign);
        pairs.extend_pairs(self.params());
        let query = pairs.finish();

        let mut next = url.clone();
        next.set_query((!query.is_empty()).then_some(query.as_str()));
        next
    }

    pub fn filter_type(&self) -> Option<&str> {
        self.filter_type.as_deref()
    }

    pub fn filter_group(&self) -> Option<&str> {
        self.filter_group.as_deref()
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn down_only(&self) -> bool {
        self.down_only
    }

    pub fn set_filter_type(&mut self, value: &str) {
        self.filter_type = selection(value);
    }

    pub fn set_filter_group(&mut self, value: &str) {
        self.filter_group = selection(value);
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    pub fn toggle_down_only(&mut self) {
        self.down_only = !self.down_only;
    }
}

// ---

/// Derive the visible, ordered device list.
pub fn view<'a>(
    devices: &'a [AggregatedDevice],
    groups: &[DeviceGroup],
    state: &ViewState,
) -> Vec<&'a AggregatedDevice> {
    // ---
    let group = state
        .filter_group
        .as_deref()
        .map(|id| groups.iter().find(|g| g.id.to_string() == id));

    let mut visible: Vec<&AggregatedDevice> = devices
        .iter()
        .filter(|d| {
            state
                .filter_type
                .as_deref()
                .map_or(true, |t| d.device.device_type.as_deref() == Some(t))
        })
        .filter(|d| match group {
            None => true,
            Some(Some(g)) => g.contains(d.device.id),
            // Selected group no longer exists
            Some(None) => false,
        })
        .filter(|d| !state.down_only || d.is_down())
        .collect();

    match state.sort {
        SortKey::Name => {
            visible.sort_by(|a, b| collate(&a.device.display_name, &b.device.display_name));
        }
        SortKey::Id => visible.sort_by_key(|d| d.device.id),
        SortKey::Status => {
            visible.sort_by_key(|d| (Reverse(d.is_down()), Reverse(d.has_alert()), d.device.id));
        }
    }
    visible
}

/// Dictionary order: case-insensitive first, lowercase before uppercase
/// when two names differ only in case.
fn collate(a: &str, b: &str) -> Ordering {
    // ---
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| {
            let lowercase_mask = |s: &str| s.chars().map(char::is_lowercase).collect::<Vec<_>>();
            lowercase_mask(b).cmp(&lowercase_mask(a))
        })
        .then_with(|| a.cmp(b))
}

/// Distinct device types in first-seen order, for the type selector.
pub fn available_types(devices: &[AggregatedDevice]) -> Vec<String> {
    // ---
    let mut types: Vec<String> = Vec::new();
    for t in devices.iter().filter_map(|d| d.device.device_type.as_ref()) {
        if !types.contains(t) {
            types.push(t.clone());
        }
    }
    types
}

/// Ticker lines for every down or alerting device, in view order.
pub fn alert_messages(devices: &[&AggregatedDevice]) -> Vec<String> {
    // ---
    devices
        .iter()
        .filter(|d| d.is_down() || d.has_alert())
        .map(|d| {
            let prefix = d
                .device
                .device_type
                .as_deref()
                .map(|t| format!("{} - ", t.to_uppercase()))
                .unwrap_or_default();
            let state = if d.is_down() { "DOWN" } else { "ALERT" };
            format!("{}{} {}", prefix, d.device.display_name, state)
        })
        .collect()
}

/// Deep link to a device's page on the monitoring backend.
pub fn device_link(base_url: &str, device_id: u64) -> String {
    format!("{}/device/device={}/", base_url.trim_end_matches('/'), device_id)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Alert, Device, OperationalStatus, Severity};

    fn device(id: u64, name: &str, kind: Option<&str>, down: bool, alert: bool) -> AggregatedDevice {
        // ---
        AggregatedDevice {
            device: Device {
                id,
                hostname: format!("host-{id}"),
                display_name: name.to_string(),
                ip: format!("10.0.0.{id}"),
                status: if down {
                    OperationalStatus::Down
                } else {
                    OperationalStatus::Up
                },
                device_type: kind.map(String::from),
                polling_disabled: false,
                alerting_disabled: false,
                last_polled: None,
            },
            active_alert: alert.then(|| Alert {
                id: id * 100,
                device_id: id,
                rule_id: None,
                severity: Severity::Warning,
                rule: "Port down".to_string(),
                hostname: format!("host-{id}"),
                display_name: name.to_string(),
                raised_at: None,
            }),
        }
    }

    fn ids(devices: &[&AggregatedDevice]) -> Vec<u64> {
        devices.iter().map(|d| d.device.id).collect()
    }

    fn group(id: u64, members: Option<&[u64]>) -> DeviceGroup {
        DeviceGroup {
            id,
            name: format!("group-{id}"),
            description: String::new(),
            members: members.map(|m| m.iter().copied().collect()),
        }
    }

    #[test]
    fn test_status_sort_three_tiers() {
        // ---
        let devices = vec![
            device(9, "c", None, false, false),
            device(2, "b", None, false, true),
            device(5, "a", None, true, false),
        ];

        let out = view(&devices, &[], &ViewState::default());
        assert_eq!(ids(&out), vec![5, 2, 9]);
    }

    #[test]
    fn test_status_sort_ties_by_id() {
        // ---
        let devices = vec![
            device(8, "x", None, true, true),
            device(4, "y", None, true, false),
            device(6, "z", None, false, true),
            device(3, "w", None, false, true),
        ];

        let out = view(&devices, &[], &ViewState::default());
        assert_eq!(ids(&out), vec![8, 4, 3, 6]);
    }

    #[test]
    fn test_name_and_id_sort() {
        // ---
        let devices = vec![
            device(3, "beta", None, false, false),
            device(1, "Zulu", None, false, false),
            device(2, "alpha", None, false, false),
        ];

        let mut state = ViewState::default();
        state.set_sort(SortKey::Name);
        assert_eq!(ids(&view(&devices, &[], &state)), vec![2, 3, 1]);

        state.set_sort(SortKey::Id);
        assert_eq!(ids(&view(&devices, &[], &state)), vec![1, 2, 3]);
    }

    #[test]
    fn test_name_sort_is_case_insensitive() {
        // ---
        let devices = vec![
            device(1, "Web-02", None, false, false),
            device(2, "web-01", None, false, false),
            device(3, "WEB-01", None, false, false),
            device(4, "db", None, false, false),
        ];

        let mut state = ViewState::default();
        state.set_sort(SortKey::Name);
        assert_eq!(ids(&view(&devices, &[], &state)), vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_type_and_down_filters() {
        // ---
        let devices = vec![
            device(2, "a", Some("server"), true, false),
            device(3, "b", Some("network"), true, false),
            device(4, "c", Some("server"), false, false),
            device(5, "d", None, true, false),
        ];

        let mut state = ViewState::default();
        state.set_filter_type("server");
        assert_eq!(ids(&view(&devices, &[], &state)), vec![2, 4]);

        state.toggle_down_only();
        assert_eq!(ids(&view(&devices, &[], &state)), vec![2]);

        state.set_filter_type("all");
        assert_eq!(ids(&view(&devices, &[], &state)), vec![2, 3, 5]);
    }

    #[test]
    fn test_group_filter() {
        // ---
        let devices = vec![
            device(2, "a", None, false, false),
            device(3, "b", None, false, false),
            device(4, "c", None, false, false),
        ];
        let groups = vec![group(7, Some(&[2, 4])), group(8, None)];

        let mut state = ViewState::default();
        state.set_filter_group("7");
        assert_eq!(ids(&view(&devices, &groups, &state)), vec![2, 4]);

        // Membership never loaded
        state.set_filter_group("8");
        assert!(view(&devices, &groups, &state).is_empty());

        // Unknown group
        state.set_filter_group("99");
        assert!(view(&devices, &groups, &state).is_empty());
    }

    #[test]
    fn test_defaults_produce_empty_query() {
        // ---
        let state = ViewState::default();
        assert_eq!(state.to_query(), "");

        let url = Url::parse("https://board.example.com/?sort=name&down=true").unwrap();
        let next = state.apply_to_url(&url);
        assert_eq!(next.as_str(), "https://board.example.com/");
        assert_eq!(next.query(), None);
    }

    #[test]
    fn test_url_round_trip() {
        // ---
        let state = ViewState {
            filter_type: Some("wireless & ap".to_string()),
            filter_group: Some("12".to_string()),
            sort: SortKey::Id,
            down_only: true,
        };

        let base = Url::parse("https://board.example.com/").unwrap();
        let url = state.apply_to_url(&base);
        assert_eq!(ViewState::from_url(&url), state);
        assert_eq!(ViewState::from_query(&state.to_query()), state);
    }

    #[test]
    fn test_default_values_removed_from_url() {
        // ---
        let mut state = ViewState::from_query("?type=server&sort=id&down=true");
        state.set_filter_type("all");
        state.set_sort(SortKey::Status);
        state.toggle_down_only();

        assert_eq!(state, ViewState::default());
        assert_eq!(state.to_query(), "");
    }

    #[test]
    fn test_foreign_params_preserved() {
        // ---
        let url = Url::parse("https://board.example.com/?kiosk=1&sort=name").unwrap();
        let mut state = ViewState::from_url(&url);
        assert_eq!(state.sort, SortKey::Name);

        state.toggle_down_only();
        let next = state.apply_to_url(&url);
        assert_eq!(next.query(), Some("kiosk=1&sort=name&down=true"));
    }

    #[test]
    fn test_setter_values_survive_round_trip() {
        // ---
        let mut state = ViewState::default();
        for (kind, group) in [(" server ", " 12"), ("all", ""), ("", "all")] {
            state.set_filter_type(kind);
            state.set_filter_group(group);
            state.set_sort(SortKey::Name);

            let restored = ViewState::from_query(&state.to_query());
            assert_eq!(restored, state, "type={kind:?} group={group:?}");
        }

        state.set_filter_type(" server ");
        assert_eq!(state.filter_type(), Some("server"));
        assert_eq!(state.to_query(), "type=server&sort=name");
    }

    #[test]
    fn test_repeated_param_keeps_first_value() {
        // ---
        let state = ViewState::from_query("sort=name&sort=id&type=server&type=network");
        assert_eq!(state.sort(), SortKey::Name);
        assert_eq!(state.filter_type(), Some("server"));
    }

    #[test]
    fn test_invalid_query_values_fall_back() {
        // ---
        let state = ViewState::from_query("sort=priority&down=yes&type=all&group=");
        assert_eq!(state, ViewState::default());
    }

    #[test]
    fn test_available_types_and_messages() {
        // ---
        let devices = vec![
            device(5, "db-01", Some("server"), true, false),
            device(2, "sw-02", Some("network"), false, true),
            device(9, "ap-03", Some("server"), false, false),
            device(7, "fw-04", None, false, true),
        ];

        assert_eq!(available_types(&devices), vec!["server", "network"]);

        let visible = view(&devices, &[], &ViewState::default());
        assert_eq!(
            alert_messages(&visible),
            vec!["SERVER - db-01 DOWN", "NETWORK - sw-02 ALERT", "fw-04 ALERT"]
        );
    }

    #[test]
    fn test_device_link() {
        // ---
        assert_eq!(
            device_link("https://nms.example.com/", 42),
            "https://nms.example.com/device/device=42/"
        );
    }
}
