//! Semantic equality between a desired-state snapshot object and its live
//! counterpart.
//!
//! Only labels and the `status` subtree are compared. Timestamp strings are
//! always considered equal, quantity strings compare by numeric value, and
//! `status.conditions` compare as maps keyed by condition type: every
//! desired condition must appear live with the same status, and the live
//! object must not carry extra condition types. When the snapshot status
//! has a `conditions` key, conditions are the only part of status compared.

use chrono::DateTime;
use kube::core::DynamicObject;
use serde_json::{Map, Value};

use crate::quantity::parse_quantity;

const STATUS: &str = "status";
const CONDITIONS: &str = "conditions";
const CONDITION_TYPE: &str = "type";
const CONDITION_STATUS: &str = "status";

/// Whether the live object still matches the desired snapshot.
pub(crate) fn is_equal(desired: &DynamicObject, actual: &DynamicObject) -> bool {
    if desired.metadata.labels != actual.metadata.labels {
        return false;
    }

    let Some(desired_status) = desired.data.get(STATUS) else {
        // No desired status: nothing more to compare.
        return true;
    };

    let Some(actual_status) = actual.data.get(STATUS) else {
        // The snapshot has a status but the live object lost it.
        return false;
    };

    match (desired_status.as_object(), actual_status.as_object()) {
        (Some(desired_map), Some(actual_map)) => {
            if desired_map.contains_key(CONDITIONS) {
                // Conditions present in the snapshot: they are the only
                // part of status that is compared.
                return compare_conditions(desired_map, actual_map);
            }

            semantic_eq(desired_status, actual_status)
        }
        (None, None) => semantic_eq(desired_status, actual_status),
        _ => false,
    }
}

fn compare_conditions(desired_status: &Map<String, Value>, actual_status: &Map<String, Value>) -> bool {
    let Some(desired_conditions) = desired_status.get(CONDITIONS) else {
        return true;
    };
    let Some(actual_conditions) = actual_status.get(CONDITIONS) else {
        return false;
    };

    let Some(desired_by_type) = conditions_by_type(desired_conditions) else {
        return false;
    };
    let Some(mut actual_by_type) = conditions_by_type(actual_conditions) else {
        return false;
    };

    for (condition_type, desired_condition) in desired_by_type {
        let Some(actual_condition) = actual_by_type.remove(&condition_type) else {
            return false;
        };

        let desired_status_value = desired_condition.get(CONDITION_STATUS).unwrap_or(&Value::Null);
        let actual_status_value = actual_condition.get(CONDITION_STATUS).unwrap_or(&Value::Null);
        if !semantic_eq(desired_status_value, actual_status_value) {
            return false;
        }
    }

    // Any live condition type the snapshot doesn't know is a mismatch.
    actual_by_type.is_empty()
}

fn conditions_by_type(conditions: &Value) -> Option<Map<String, Value>> {
    let list = conditions.as_array()?;

    let mut by_type = Map::new();
    for condition in list {
        let condition = condition.as_object()?;
        let condition_type = condition.get(CONDITION_TYPE)?.as_str()?;
        by_type.insert(condition_type.to_string(), Value::Object(condition.clone()));
    }

    Some(by_type)
}

/// Structural equality with the chaos-relevant leniencies: timestamps are
/// always equal, quantity strings compare numerically, numbers compare by
/// value.
fn semantic_eq(desired: &Value, actual: &Value) -> bool {
    match (desired, actual) {
        (Value::Object(desired), Value::Object(actual)) => {
            desired.len() == actual.len()
                && desired.iter().all(|(key, desired_value)| {
                    actual
                        .get(key)
                        .is_some_and(|actual_value| semantic_eq(desired_value, actual_value))
                })
        }
        (Value::Array(desired), Value::Array(actual)) => {
            desired.len() == actual.len()
                && desired
                    .iter()
                    .zip(actual)
                    .all(|(desired_value, actual_value)| semantic_eq(desired_value, actual_value))
        }
        (Value::String(desired), Value::String(actual)) => string_eq(desired, actual),
        (Value::Number(desired), Value::Number(actual)) => {
            match (desired.as_f64(), actual.as_f64()) {
                (Some(desired), Some(actual)) => numeric_eq(desired, actual),
                _ => desired == actual,
            }
        }
        _ => desired == actual,
    }
}

fn string_eq(desired: &str, actual: &str) -> bool {
    if desired == actual {
        return true;
    }

    // Timestamps are never compared.
    if DateTime::parse_from_rfc3339(desired).is_ok() && DateTime::parse_from_rfc3339(actual).is_ok()
    {
        return true;
    }

    // Quantities compare by value, ignoring formatting.
    if let (Some(desired), Some(actual)) = (parse_quantity(desired), parse_quantity(actual)) {
        return numeric_eq(desired, actual);
    }

    false
}

fn numeric_eq(desired: f64, actual: f64) -> bool {
    let scale = desired.abs().max(actual.abs()).max(1.0);
    (desired - actual).abs() <= scale * 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    fn deployment(timestamp: &str, cpu: &str, available_status: &str) -> DynamicObject {
        object(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "api",
                "namespace": "prod",
                "creationTimestamp": timestamp,
                "labels": { "app": "api" }
            },
            "status": {
                "conditions": [
                    { "type": "Available", "status": available_status },
                    { "type": "Progressing", "status": "True" }
                ],
                "allocatedCpu": cpu
            }
        }))
    }

    #[test]
    fn timestamp_and_quantity_formatting_are_ignored() {
        let desired = deployment("2024-01-01T00:00:00Z", "100m", "True");
        let actual = deployment("2024-06-30T12:34:56Z", "0.1", "True");

        assert!(is_equal(&desired, &actual));
    }

    #[test]
    fn flipped_condition_status_is_a_mismatch() {
        let desired = deployment("2024-01-01T00:00:00Z", "100m", "True");
        let actual = deployment("2024-01-01T00:00:00Z", "100m", "False");

        assert!(!is_equal(&desired, &actual));
    }

    #[test]
    fn extra_live_condition_type_is_a_mismatch() {
        let desired = deployment("2024-01-01T00:00:00Z", "100m", "True");
        let mut actual = deployment("2024-01-01T00:00:00Z", "100m", "True");
        actual.data[STATUS][CONDITIONS]
            .as_array_mut()
            .unwrap()
            .push(json!({ "type": "ReplicaFailure", "status": "True" }));

        assert!(!is_equal(&desired, &actual));
    }

    #[test]
    fn missing_desired_condition_type_is_a_mismatch() {
        let desired = deployment("2024-01-01T00:00:00Z", "100m", "True");
        let mut actual = deployment("2024-01-01T00:00:00Z", "100m", "True");
        actual.data[STATUS][CONDITIONS]
            .as_array_mut()
            .unwrap()
            .remove(1);

        assert!(!is_equal(&desired, &actual));
    }

    #[test]
    fn label_change_is_a_mismatch() {
        let desired = deployment("2024-01-01T00:00:00Z", "100m", "True");
        let mut actual = deployment("2024-01-01T00:00:00Z", "100m", "True");
        actual
            .metadata
            .labels
            .as_mut()
            .unwrap()
            .insert("app".to_string(), "api-canary".to_string());

        assert!(!is_equal(&desired, &actual));
    }

    #[test]
    fn condition_order_is_irrelevant() {
        let desired = deployment("2024-01-01T00:00:00Z", "100m", "True");
        let mut actual = deployment("2024-01-01T00:00:00Z", "100m", "True");
        actual.data[STATUS][CONDITIONS]
            .as_array_mut()
            .unwrap()
            .reverse();

        assert!(is_equal(&desired, &actual));
    }

    #[test]
    fn missing_live_status_is_a_mismatch() {
        let desired = deployment("2024-01-01T00:00:00Z", "100m", "True");
        let mut actual = deployment("2024-01-01T00:00:00Z", "100m", "True");
        actual.data.as_object_mut().unwrap().remove(STATUS);

        assert!(!is_equal(&desired, &actual));
    }

    #[test]
    fn objects_without_status_compare_by_labels_only() {
        let desired = object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "settings", "labels": { "app": "api" } },
            "data": { "mode": "fast" }
        }));
        let actual = object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "settings", "labels": { "app": "api" } },
            "data": { "mode": "slow" }
        }));

        // Fields outside labels and status are not part of the comparison.
        assert!(is_equal(&desired, &actual));
    }

    #[test]
    fn conditionless_status_compares_structurally() {
        let desired = object(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "worker" },
            "status": { "phase": "Running", "startTime": "2024-01-01T00:00:00Z" }
        }));
        let mut actual = object(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "worker" },
            "status": { "phase": "Running", "startTime": "2024-03-03T03:03:03Z" }
        }));

        assert!(is_equal(&desired, &actual));

        actual.data[STATUS]["phase"] = json!("Pending");
        assert!(!is_equal(&desired, &actual));
    }
}
