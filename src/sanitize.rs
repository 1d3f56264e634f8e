//! Response sanitizer.
//!
//! Upstream device and alert records carry far more than the board needs,
//! including fields that must never reach a browser (SNMP communities, auth
//! material, internal metadata). [`sanitize`] reduces each response to an
//! approved field set keyed on the endpoint kind. It never fabricates data:
//! fields missing upstream stay missing.

use serde_json::{Map, Value};

use crate::guard::Endpoint;

// ---

/// Fields a device record may expose.
pub const DEVICE_FIELDS: &[&str] = &[
    "device_id",
    "hostname",
    "sysName",
    "ip",
    "status",
    "type",
    "disabled",
    "ignore",
    "last_polled",
];

/// Fields an alert record may expose.
pub const ALERT_FIELDS: &[&str] = &[
    "id",
    "device_id",
    "rule_id",
    "state",
    "severity",
    "hostname",
    "sysName",
    "rule",
    "timestamp",
];

/// Envelope keys kept next to the record list in wrapped responses.
const ENVELOPE_FIELDS: &[&str] = &["status", "count"];

/// Strip `body` down to the approved field subset for `endpoint`.
pub fn sanitize(endpoint: &Endpoint, body: Value) -> Value {
    // ---
    match endpoint {
        Endpoint::Devices => filter_listing(body, "devices", DEVICE_FIELDS),
        Endpoint::Alerts => filter_listing(body, "alerts", ALERT_FIELDS),
        Endpoint::DeviceGroup(_) => group_members(&body),
        Endpoint::DeviceGroups => body,
    }
}

/// Reduce every record of a wrapped or bare listing to `fields`.
fn filter_listing(body: Value, key: &str, fields: &[&str]) -> Value {
    // ---
    match body {
        Value::Array(items) => Value::Array(filter_records(items, fields)),
        Value::Object(mut map) => {
            let mut out = Map::new();
            for field in ENVELOPE_FIELDS {
                if let Some(v) = map.remove(*field) {
                    out.insert((*field).to_string(), v);
                }
            }
            if let Some(Value::Array(items)) = map.remove(key) {
                out.insert(key.to_string(), Value::Array(filter_records(items, fields)));
            }
            Value::Object(out)
        }
        // Scalars carry no records and nothing worth forwarding.
        _ => Value::Object(Map::new()),
    }
}

fn filter_records(items: Vec<Value>, fields: &[&str]) -> Vec<Value> {
    // ---
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(Value::Object(pick(record, fields))),
            _ => None,
        })
        .collect()
}

fn pick(mut record: Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    // ---
    fields
        .iter()
        .filter_map(|f| record.remove(*f).map(|v| ((*f).to_string(), v)))
        .collect()
}

/// Keep only the member device ids of a group detail response.
fn group_members(body: &Value) -> Value {
    // ---
    let members: Vec<Value> = body
        .get("devices")
        .and_then(Value::as_array)
        .map(|devices| {
            devices
                .iter()
                .filter_map(|d| d.get("device_id").cloned())
                .map(|id| {
                    let mut m = Map::new();
                    m.insert("device_id".to_string(), id);
                    Value::Object(m)
                })
                .collect()
        })
        .unwrap_or_default();

    let mut out = Map::new();
    out.insert("devices".to_string(), Value::Array(members));
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn full_device(id: u64) -> Value {
        json!({
            "device_id": id,
            "hostname": "10.0.0.1",
            "sysName": "edge-router",
            "ip": "10.0.0.1",
            "status": 1,
            "hardware": "MX204",
            "os": "junos",
            "location": "Rack 4",
            "type": "network",
            "disabled": 0,
            "ignore": 0,
            "last_polled": "2025-03-26 18:45:00",
            "community": "s3cr3t",
            "authpass": "hunter2",
            "snmpver": "v2c"
        })
    }

    fn assert_only_fields(record: &Value, allowed: &[&str]) {
        let obj = record.as_object().unwrap();
        for key in obj.keys() {
            assert!(allowed.contains(&key.as_str()), "unexpected key {key}");
        }
    }

    #[test]
    fn test_wrapped_devices_stripped() {
        // ---
        let body = json!({
            "status": "ok",
            "count": 2,
            "debug": {"sql": "SELECT *"},
            "devices": [full_device(3), full_device(4)]
        });

        let out = sanitize(&Endpoint::Devices, body);

        let devices = out["devices"].as_array().unwrap();
        assert_eq!(devices.len(), 2);
        for d in devices {
            assert_only_fields(d, DEVICE_FIELDS);
        }
        assert_eq!(devices[0]["sysName"], "edge-router");
        assert_eq!(out["count"], 2);
        assert!(out.get("debug").is_none());
    }

    #[test]
    fn test_bare_devices_stripped() {
        // ---
        let body = json!([full_device(3)]);
        let out = sanitize(&Endpoint::Devices, body);

        let devices = out.as_array().unwrap();
        assert_eq!(devices.len(), 1);
        assert_only_fields(&devices[0], DEVICE_FIELDS);
        assert!(devices[0].get("community").is_none());
    }

    #[test]
    fn test_missing_fields_not_defaulted() {
        // ---
        let body = json!({"devices": [{"device_id": 5, "community": "public"}]});
        let out = sanitize(&Endpoint::Devices, body);

        assert_eq!(out["devices"][0], json!({"device_id": 5}));
    }

    #[test]
    fn test_alerts_stripped() {
        // ---
        let body = json!({"alerts": [{
            "id": 11,
            "device_id": 3,
            "rule_id": 2,
            "state": 1,
            "severity": "critical",
            "hostname": "10.0.0.3",
            "sysName": "db-01",
            "rule": "Device Down",
            "timestamp": "2025-03-26 18:45:00",
            "details": {"contacts": {"ops@example.com": "Ops"}},
            "proc": "https://runbook.internal/db"
        }]});

        let out = sanitize(&Endpoint::Alerts, body);
        let alert = &out["alerts"][0];
        assert_only_fields(alert, ALERT_FIELDS);
        assert_eq!(alert.as_object().unwrap().len(), ALERT_FIELDS.len());
    }

    #[test]
    fn test_group_detail_keeps_member_ids_only() {
        // ---
        let body = json!({
            "status": "ok",
            "name": "Core",
            "pattern": "hostname LIKE 'core%'",
            "devices": [{"device_id": 3, "hostname": "core-1"}, {"device_id": 8}]
        });

        let out = sanitize(&Endpoint::DeviceGroup(4), body);
        assert_eq!(out, json!({"devices": [{"device_id": 3}, {"device_id": 8}]}));
    }

    #[test]
    fn test_group_list_passes_through() {
        // ---
        let body = json!({"groups": [{"id": 1, "name": "Core", "desc": "core switches"}]});
        let out = sanitize(&Endpoint::DeviceGroups, body.clone());
        assert_eq!(out, body);
    }

    #[test]
    fn test_non_object_records_dropped() {
        // ---
        let body = json!([full_device(3), "junk", 42]);
        let out = sanitize(&Endpoint::Devices, body);
        assert_eq!(out.as_array().unwrap().len(), 1);
    }
}
