//! Lenient field readers shared by the record types.

use crate::health::parse_timestamp;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub(super) type Object = Map<String, Value>;

/// Non-empty, trimmed string field.
pub(super) fn text(object: &Object, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Non-negative counter; absent, negative or non-numeric values read as zero.
pub(super) fn count(object: &Object, key: &str) -> u64 {
    match object.get(key) {
        Some(Value::Number(number)) => number.as_u64().unwrap_or_default(),
        Some(Value::String(raw)) => raw.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

pub(super) fn timestamp(object: &Object, key: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(object.get(key))
}

/// Field value unless absent or `null`.
pub(super) fn present(object: &Object, key: &str) -> Option<Value> {
    object.get(key).filter(|value| !value.is_null()).cloned()
}

/// Copies every field not listed in `known`.
pub(super) fn remainder(object: &Object, known: &[&str]) -> Object {
    object
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
