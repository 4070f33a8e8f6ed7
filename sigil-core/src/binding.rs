//! Binding resolution
//!
//! Bindings are string references into the execution context, written as
//! `@root.path.to.field` (e.g. `@payload.name`, `@entity.status`,
//! `@user.id`). Anything that is not a string starting with `@` is a
//! literal and passes through untouched.
//!
//! Context values are canonical JSON, so resolution is a plain map walk: a
//! missing root or a missing segment resolves to `Null`, never an error.

use serde_json::{Map, Value};

use crate::context::EventContext;

/// Resolve a single value against the context.
///
/// Returns the value unchanged unless it is a `@`-prefixed string. A binding
/// whose root is absent from the context resolves to `Null`; once any
/// segment resolves to `Null`, the remaining segments are skipped.
pub fn resolve(value: &Value, context: &EventContext) -> Value {
    let Some(text) = value.as_str() else {
        return value.clone();
    };
    let Some(path) = text.strip_prefix('@') else {
        return value.clone();
    };

    let mut segments = path.split('.');
    let root = segments.next().unwrap_or_default();
    let Some(mut current) = context.get(root) else {
        return Value::Null;
    };

    for segment in segments {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => current = next,
                None => return Value::Null,
            },
            // Canonical representation is keyed maps all the way down, so a
            // scalar or list mid-path means the binding dead-ends.
            _ => return Value::Null,
        }
    }

    current.clone()
}

/// Resolve every binding inside a map, recursing into nested maps and lists.
///
/// List elements are resolved as standalone values: strings through
/// [`resolve`], maps recursively, anything else unchanged. The input is
/// never mutated; a new structure is returned.
pub fn resolve_deep(data: &Map<String, Value>, context: &EventContext) -> Map<String, Value> {
    let mut out = Map::with_capacity(data.len());
    for (key, value) in data {
        out.insert(key.clone(), resolve_value(value, context));
    }
    out
}

fn resolve_value(value: &Value, context: &EventContext) -> Value {
    match value {
        Value::String(_) => resolve(value, context),
        Value::Object(map) => Value::Object(resolve_deep(map, context)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, context))
                .collect(),
        ),
        other => other.clone(),
    }
}
