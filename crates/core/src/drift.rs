// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drift detection: recorded resource attributes vs observed reality.
//!
//! The comparison is pure. Reading the observed side (inspecting containers,
//! querying APIs) is the caller's job; nothing here mutates the stack.

use crate::stack::StackState;
use crate::StackId;
use serde::{Deserialize, Serialize};

/// Observed attributes for one resource, as reported by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResource {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// One attribute that differs between recorded and observed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDrift {
    pub key: String,
    pub expected: serde_json::Value,
    pub actual: serde_json::Value,
}

/// Per-resource drift entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDrift {
    pub kind: String,
    pub name: String,
    pub fields: Vec<FieldDrift>,
}

/// Result of a drift check across a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub stack_id: StackId,
    pub checked_at_ms: u64,
    /// Resources whose observed attributes differ from the record.
    pub drifted: Vec<ResourceDrift>,
    /// Observed resources the stack does not track.
    pub untracked: Vec<ObservedResource>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty() && self.untracked.is_empty()
    }
}

/// Compare each observed resource against the stack's recorded attributes.
///
/// Keys present on either side participate in the diff; a key missing from
/// one side diffs against JSON `null`.
pub fn detect_drift(
    stack: &StackState,
    observed: &[ObservedResource],
    now_ms: u64,
) -> DriftReport {
    let mut drifted = Vec::new();
    let mut untracked = Vec::new();

    for obs in observed {
        match stack.resource(&obs.kind, &obs.name) {
            Some(recorded) => {
                let fields = diff_attributes(&recorded.attributes, &obs.attributes);
                if !fields.is_empty() {
                    drifted.push(ResourceDrift {
                        kind: obs.kind.clone(),
                        name: obs.name.clone(),
                        fields,
                    });
                }
            }
            None => untracked.push(obs.clone()),
        }
    }

    DriftReport { stack_id: stack.id, checked_at_ms: now_ms, drifted, untracked }
}

fn diff_attributes(expected: &serde_json::Value, actual: &serde_json::Value) -> Vec<FieldDrift> {
    use serde_json::Value;

    let empty = serde_json::Map::new();
    let expected_map = expected.as_object().unwrap_or(&empty);
    let actual_map = actual.as_object().unwrap_or(&empty);

    let mut keys: Vec<&String> = expected_map.keys().chain(actual_map.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let exp = expected_map.get(key).cloned().unwrap_or(Value::Null);
            let act = actual_map.get(key).cloned().unwrap_or(Value::Null);
            (exp != act).then(|| FieldDrift { key: key.clone(), expected: exp, actual: act })
        })
        .collect()
}

#[cfg(test)]
#[path = "drift_tests.rs"]
mod tests;
