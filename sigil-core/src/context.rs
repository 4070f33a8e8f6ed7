//! Per-request execution context
//!
//! The context maps root names (`payload`, `entity`, `user`, `entityId`) to
//! JSON values for the lifetime of one event's processing. It is owned by
//! the dispatcher invocation that created it and never shared across
//! concurrent events, which is what makes the `set` effect's in-place
//! mutation safe.

use serde_json::{Map, Value};

/// Mutable execution context for a single event.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    roots: Map<String, Value>,
}

impl EventContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Non-object values yield an empty
    /// context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(roots) => Self { roots },
            _ => Self::default(),
        }
    }

    /// Standard context for an inbound event: `payload`, plus `entityId`
    /// when the route carries one.
    pub fn for_event(payload: Map<String, Value>, entity_id: Option<&str>) -> Self {
        let mut ctx = Self::new();
        ctx.insert("payload", Value::Object(payload));
        if let Some(id) = entity_id {
            ctx.insert("entityId", Value::String(id.to_string()));
        }
        ctx
    }

    pub fn insert(&mut self, root: impl Into<String>, value: Value) {
        self.roots.insert(root.into(), value);
    }

    pub fn get(&self, root: &str) -> Option<&Value> {
        self.roots.get(root)
    }

    /// The `entityId` root, when present and a string.
    pub fn entity_id(&self) -> Option<&str> {
        self.roots.get("entityId").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Assign `value` at `root.segments...`, creating empty maps at every
    /// missing hop. A non-map value encountered mid-path is replaced by an
    /// empty map; navigation never fails.
    pub fn set_path(&mut self, root: &str, segments: &[&str], value: Value) {
        let (last, intermediate) = match segments.split_last() {
            Some(parts) => parts,
            None => {
                self.roots.insert(root.to_string(), value);
                return;
            }
        };

        let entry = self
            .roots
            .entry(root.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        let mut current = entry;
        for segment in intermediate {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current = current
                .as_object_mut()
                .expect("hop was just defaulted to an object")
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current
            .as_object_mut()
            .expect("target parent is an object")
            .insert(last.to_string(), value);
    }
}
