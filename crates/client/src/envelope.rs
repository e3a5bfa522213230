//! Response envelope parsing.
//!
//! Most backend endpoints answer `{ "success": bool, "data": ..., "message": ... }`
//! (sometimes with PascalCase keys); some answer the bare payload. This is the
//! one place that tells the two apart, so callers only ever see the payload.

use serde_json::Value;

use crate::error::ApiError;

/// Look up `key` in a JSON object, also accepting the key with its first
/// letter upper-cased (`data` / `Data`).
pub fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    if let Some(v) = obj.get(key) {
        return Some(v);
    }
    let mut chars = key.chars();
    let first = chars.next()?;
    let alt: String = first.to_uppercase().chain(chars).collect();
    obj.get(&alt)
}

/// Turn a successful response body into its payload.
///
/// - empty body → `null`
/// - envelope with `success: true` → the `data` field (`null` if absent)
/// - envelope with `success: false` → [`ApiError::Rejected`] with `message`
/// - anything else → the body unchanged
pub fn unwrap_envelope(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    let value: Value = serde_json::from_slice(body)?;

    let Some(success) = field(&value, "success").and_then(Value::as_bool) else {
        return Ok(value);
    };

    if !success {
        let message = field(&value, "message")
            .and_then(Value::as_str)
            .unwrap_or("request was not successful")
            .to_string();
        return Err(ApiError::Rejected(message));
    }

    Ok(field(&value, "data").cloned().unwrap_or(Value::Null))
}
