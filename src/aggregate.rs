//! Join of devices and alerts into the per-device board view.
//!
//! Pure and synchronous; fetching and group enrichment happen in
//! [`crate::board`].

use std::collections::{BTreeSet, HashMap};

use crate::models::{AggregatedDevice, Alert, Device, Severity};

/// Device id reserved by the monitoring platform itself; never shown.
pub const PLATFORM_DEVICE_ID: u64 = 1;

// ---

/// User-selected subset of device ids. Empty means every device is shown.
///
/// Ids are kept signed: a negative entry such as `-4` still counts, so the
/// list is non-empty yet matches no device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(BTreeSet<i64>);

impl AllowList {
    /// Parse a comma-separated list of integers, silently dropping tokens
    /// that are not integers.
    pub fn parse(raw: &str) -> Self {
        // ---
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .filter_map(|t| match t.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::debug!("Ignoring invalid device id token '{}'", t);
                    None
                }
            })
            .collect();
        AllowList(ids)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn permits(&self, device_id: u64) -> bool {
        self.0.is_empty()
            || i64::try_from(device_id).is_ok_and(|id| self.0.contains(&id))
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<i64> for AllowList {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        AllowList(iter.into_iter().collect())
    }
}

/// Whether a device survives the fixed platform exclusion rules.
pub fn is_displayable(device: &Device) -> bool {
    device.id != PLATFORM_DEVICE_ID && !device.polling_disabled && !device.alerting_disabled
}

/// Pick the alert with the highest precedence; the earliest wins a tie.
/// Alerts of class `Other` never become active.
pub fn active_alert<'a, I>(alerts: I) -> Option<&'a Alert>
where
    I: IntoIterator<Item = &'a Alert>,
{
    // ---
    let mut best: Option<&Alert> = None;
    for alert in alerts {
        if alert.severity == Severity::Other {
            continue;
        }
        if best.map_or(true, |b| alert.severity > b.severity) {
            best = Some(alert);
        }
    }
    best
}

/// Filter devices and attach each survivor's active alert.
///
/// Alerts pointing at devices outside the surviving set are dropped.
/// Device order is preserved.
pub fn aggregate(
    alerts: &[Alert],
    devices: Vec<Device>,
    allow_list: &AllowList,
) -> Vec<AggregatedDevice> {
    // ---
    let mut by_device: HashMap<u64, Vec<&Alert>> = HashMap::new();
    for alert in alerts {
        by_device.entry(alert.device_id).or_default().push(alert);
    }

    devices
        .into_iter()
        .filter(|d| allow_list.permits(d.id))
        .filter(is_displayable)
        .map(|device| {
            let active_alert = by_device
                .get(&device.id)
                .and_then(|list| active_alert(list.iter().copied()))
                .cloned();
            AggregatedDevice {
                device,
                active_alert,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{OperationalStatus, RawAlert, RawDevice};
    use serde_json::json;

    fn device(value: serde_json::Value) -> Device {
        Device::from(serde_json::from_value::<RawDevice>(value).unwrap())
    }

    fn alert(id: u64, device_id: u64, severity: &str) -> Alert {
        Alert::from(RawAlert {
            id,
            device_id,
            rule_id: None,
            state: None,
            severity: Some(severity.to_string()),
            hostname: None,
            sys_name: None,
            rule: Some(format!("rule-{id}")),
            timestamp: None,
        })
    }

    fn ids(devices: &[AggregatedDevice]) -> Vec<u64> {
        devices.iter().map(|d| d.device.id).collect()
    }

    #[test]
    fn test_allow_list_parsing() {
        // ---
        let list = AllowList::parse(" 3, 5,abc, ,7x, 20 ");
        assert_eq!(list.ids().collect::<Vec<_>>(), vec![3, 5, 20]);
        assert!(AllowList::parse("").is_empty());
        assert!(AllowList::parse("junk, 4.5").is_empty());
    }

    #[test]
    fn test_negative_id_keeps_list_non_empty() {
        // ---
        let list = AllowList::parse("-4");
        assert!(!list.is_empty());
        assert_eq!(list.ids().collect::<Vec<_>>(), vec![-4]);

        let devices = vec![
            device(json!({"device_id": 3})),
            device(json!({"device_id": 4})),
            device(json!({"device_id": 5})),
        ];
        assert!(aggregate(&[], devices, &list).is_empty());
    }

    #[test]
    fn test_exclusion_rules() {
        // ---
        let devices = vec![
            device(json!({"device_id": 1})),
            device(json!({"device_id": 2, "disabled": 1})),
            device(json!({"device_id": 3})),
            device(json!({"device_id": 4, "ignore": true})),
        ];

        let out = aggregate(&[], devices, &AllowList::default());
        assert_eq!(ids(&out), vec![3]);
    }

    #[test]
    fn test_allow_list_cannot_resurrect_excluded_devices() {
        // ---
        let devices = vec![
            device(json!({"device_id": 1})),
            device(json!({"device_id": 3})),
            device(json!({"device_id": 5})),
        ];

        let out = aggregate(&[], devices, &AllowList::parse("1,5"));
        assert_eq!(ids(&out), vec![5]);
    }

    #[test]
    fn test_critical_wins_over_earlier_warning() {
        // ---
        let devices = vec![device(json!({"device_id": 3}))];
        let alerts = vec![alert(10, 3, "warning"), alert(11, 3, "critical")];

        let out = aggregate(&alerts, devices, &AllowList::default());
        let active = out[0].active_alert.as_ref().unwrap();
        assert_eq!(active.id, 11);
        assert_eq!(active.severity, Severity::Critical);
    }

    #[test]
    fn test_first_alert_wins_within_same_severity() {
        // ---
        let alerts = [alert(10, 3, "warning"), alert(11, 3, "warning")];
        assert_eq!(active_alert(&alerts).unwrap().id, 10);
    }

    #[test]
    fn test_other_severity_is_not_active() {
        // ---
        let devices = vec![device(json!({"device_id": 3}))];
        let alerts = vec![alert(10, 3, "ok")];

        let out = aggregate(&alerts, devices, &AllowList::default());
        assert!(out[0].active_alert.is_none());
    }

    #[test]
    fn test_orphan_alerts_dropped() {
        // ---
        let devices = vec![device(json!({"device_id": 3, "status": 0}))];
        let alerts = vec![alert(10, 99, "critical")];

        let out = aggregate(&alerts, devices, &AllowList::default());
        assert_eq!(out.len(), 1);
        assert!(out[0].active_alert.is_none());
        assert_eq!(out[0].device.status, OperationalStatus::Down);
    }
}
