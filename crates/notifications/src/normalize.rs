//! Key casing normalization for notification payloads.
//!
//! The backend serializes some payloads with PascalCase keys (hub pushes)
//! and others with camelCase (REST). Everything is normalized to camelCase
//! before parsing.

use serde_json::{Map, Value};

fn lower_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => first.to_lowercase().chain(chars).collect(),
        _ => key.to_string(),
    }
}

fn lower_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter().map(|(k, v)| (lower_first(&k), v)).collect()
}

/// Lower-case the first letter of every top-level key, and of the keys of a
/// nested `data` object. Non-objects are returned unchanged.
///
/// Values are never coerced, and the transform is idempotent.
pub fn normalize_casing(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };

    let mut map = lower_keys(map);
    if let Some(Value::Object(data)) = map.get_mut("data") {
        *data = lower_keys(std::mem::take(data));
    }

    Value::Object(map)
}
