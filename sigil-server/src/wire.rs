//! Outbound serialization normalizer
//!
//! Broadcast payloads may embed values produced by the external compute
//! service, which serializes its numeric-array handles as
//! `{"$tensor": ...}` wrapper objects (an array per dimension, or a bare
//! number for a zero-dimensional result). Clients speak plain JSON, so
//! every outbound message passes through [`normalize`] before encoding:
//! wrappers collapse to their payload, maps/lists are walked recursively,
//! and everything else is left as-is.

use serde_json::Value;

const TENSOR_KEY: &str = "$tensor";

/// Recursively convert non-JSON-native handles into plain JSON values.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            // A tensor handle collapses to its payload (array, or scalar
            // for zero-dimensional tensors).
            if map.len() == 1 {
                if let Some(payload) = map.get(TENSOR_KEY) {
                    return normalize(payload.clone());
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, normalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}
