//! Relationship classifier: decides whether a raw attribute field carries
//! relationship targets and normalizes its value into a target list.

use crate::config::ClassifierConfig;
use serde_json::Value;
use std::collections::BTreeMap;

/// Detect if a field represents relationships.
///
/// A field qualifies if its name is in the configured known set, its name
/// carries the compatibility prefix, its value is a comma-separated string,
/// or its value is already an array.
pub fn is_relationship_field(rules: &ClassifierConfig, name: &str, value: &Value) -> bool {
    if rules.known_fields.iter().any(|f| f == name) {
        return true;
    }

    if name.starts_with(&rules.compat_prefix) {
        return true;
    }

    match value {
        Value::String(s) => s.contains(','),
        Value::Array(_) => true,
        _ => false,
    }
}

/// Normalize a relationship value into an ordered list of trimmed,
/// non-empty target identifiers.
pub fn normalize_targets(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![scalar_to_string(other)],
    }
}

/// Partition a raw attribute map into scalar attributes and normalized
/// relationships. Null values are skipped entirely.
pub fn split_fields(
    rules: &ClassifierConfig,
    fields: &serde_json::Map<String, Value>,
) -> (serde_json::Map<String, Value>, BTreeMap<String, Vec<String>>) {
    let mut attributes = serde_json::Map::new();
    let mut relationships = BTreeMap::new();

    for (name, value) in fields {
        if value.is_null() {
            continue;
        }
        if is_relationship_field(rules, name, value) {
            relationships.insert(name.clone(), normalize_targets(value));
        } else {
            attributes.insert(name.clone(), value.clone());
        }
    }

    (attributes, relationships)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
