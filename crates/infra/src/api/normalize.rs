//! Uniform view of failure payloads
//!
//! Servers answer with either `{"error": {"code", "message", "details"}}` or
//! a bare `{"detail": ...}`; transport failures carry no payload at all.
//! [`normalize`] turns all of them into one `(code, message, details)` triple.

use serde::Serialize;
use serde_json::Value;
use warehouse_domain::constants::{DEFAULT_ERROR_CODE, DEFAULT_ERROR_MESSAGE, MAX_ERROR_DETAIL_ITEMS};

use super::errors::ApiError;

/// Failure shape shown to collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedError {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl NormalizedError {
    fn fallback(message: String) -> Self {
        Self { code: DEFAULT_ERROR_CODE.to_string(), message, details: None }
    }
}

pub fn normalize(err: &ApiError) -> NormalizedError {
    match err.payload() {
        Some(payload) => normalize_payload(payload, &err.to_string()),
        None => NormalizedError::fallback(err.to_string()),
    }
}

/// Normalize a decoded body; `transport_message` is used when the body has
/// neither recognised shape.
pub fn normalize_payload(payload: &Value, transport_message: &str) -> NormalizedError {
    if let Some(error) = payload.get("error").and_then(Value::as_object) {
        let text = |field: &str, default: &str| {
            error.get(field).and_then(Value::as_str).unwrap_or(default).to_string()
        };
        return NormalizedError {
            code: text("code", DEFAULT_ERROR_CODE),
            message: text("message", DEFAULT_ERROR_MESSAGE),
            details: error.get("details").filter(|d| !d.is_null()).cloned(),
        };
    }

    let detail = match payload.get("detail") {
        Some(Value::String(text)) => Some(text.as_str()),
        Some(Value::Array(items)) => items.iter().find_map(Value::as_str),
        _ => None,
    };
    if let Some(message) = detail {
        return NormalizedError {
            code: DEFAULT_ERROR_CODE.to_string(),
            message: message.to_string(),
            details: Some(payload.clone()),
        };
    }

    NormalizedError::fallback(transport_message.to_string())
}

/// Validation messages of a failure as a flat list, at most ten items
pub fn details_as_list(err: &ApiError) -> Vec<String> {
    normalize(err).details.as_ref().map(flatten_details).unwrap_or_default()
}

/// Flatten a `{field: [messages]}` map in map order.
///
/// Only list values contribute and non-string items are skipped; anything
/// other than a map yields nothing.
pub fn flatten_details(details: &Value) -> Vec<String> {
    let Some(fields) = details.as_object() else {
        return Vec::new();
    };

    fields
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_str)
        .take(MAX_ERROR_DETAIL_ITEMS)
        .map(str::to_string)
        .collect()
}
