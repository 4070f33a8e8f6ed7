//! Storage providers
//!
//! Entities are JSON maps with a required string `id`, grouped into string
//! `entityType` namespaces. All access goes through [`StorageProvider`];
//! two interchangeable backends are provided: the volatile [`MemoryStore`]
//! and the durable [`DocumentStore`].
//!
//! The only query predicate is the equality filter
//! `["=", "@entity.<field>", value]`. Any other expression is accepted
//! syntactically and treated as "no filter", a deliberate permissive
//! default rather than a validation error.

mod document;
mod memory;

pub use document::DocumentStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::EventContext;
use crate::error::StorageResult;

/// CRUD-plus-filter contract over entity storage.
///
/// Semantics shared by every backend:
/// - `create` generates a fresh random id when `data` carries none; the
///   returned entity always has the stored `id`.
/// - `update` is an upsert: a missing id creates the entity instead of
///   failing.
/// - `delete` on a missing id returns `false`, not an error.
/// - `list` applies the filter only when both a filter expression and a
///   non-empty context are supplied.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn get(&self, entity_type: &str, id: &str) -> StorageResult<Option<Value>>;

    async fn list(
        &self,
        entity_type: &str,
        filter: Option<&Value>,
        context: &EventContext,
    ) -> StorageResult<Vec<Value>>;

    async fn create(&self, entity_type: &str, data: Map<String, Value>) -> StorageResult<Value>;

    async fn update(
        &self,
        entity_type: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> StorageResult<Value>;

    async fn delete(&self, entity_type: &str, id: &str) -> StorageResult<bool>;
}

/// Parsed form of the one supported predicate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EqualityFilter {
    pub field: String,
    pub expected: Value,
}

impl EqualityFilter {
    pub fn matches(&self, entity: &Value) -> bool {
        let actual = entity
            .as_object()
            .and_then(|map| map.get(&self.field))
            .unwrap_or(&Value::Null);
        *actual == self.expected
    }
}

/// Translate a raw filter expression into the native predicate, honoring
/// the permissive fallback: `None` means "return everything". The filter is
/// only effective with a non-empty context.
pub(crate) fn effective_filter(
    filter: Option<&Value>,
    context: &EventContext,
) -> Option<EqualityFilter> {
    if context.is_empty() {
        return None;
    }
    let items = filter?.as_array()?;
    if items.first()?.as_str()? != "=" {
        return None;
    }
    let field = items.get(1)?.as_str()?.strip_prefix("@entity.")?;
    if field.is_empty() {
        return None;
    }
    let expected = items.get(2)?.clone();
    Some(EqualityFilter {
        field: field.to_string(),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EventContext {
        EventContext::from_value(json!({"entityId": "x"}))
    }

    #[test]
    fn test_well_formed_filter() {
        let raw = json!(["=", "@entity.status", "pending"]);
        let filter = effective_filter(Some(&raw), &ctx()).unwrap();

        assert_eq!(filter.field, "status");
        assert_eq!(filter.expected, json!("pending"));
        assert!(filter.matches(&json!({"status": "pending"})));
        assert!(!filter.matches(&json!({"status": "done"})));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn test_empty_context_disables_filter() {
        let raw = json!(["=", "@entity.status", "pending"]);
        assert!(effective_filter(Some(&raw), &EventContext::new()).is_none());
    }

    #[test]
    fn test_malformed_filters_are_no_filter() {
        for raw in [
            json!([]),
            json!("status = pending"),
            json!([">", "@entity.count", 3]),
            json!(["=", "status", "pending"]),
            json!(["=", "@entity.", "pending"]),
            json!(["=", "@entity.status"]),
            json!({"op": "="}),
        ] {
            assert!(
                effective_filter(Some(&raw), &ctx()).is_none(),
                "expected no filter for {raw}"
            );
        }
    }
}
