//! Effect dispatcher
//!
//! Interprets an ordered effect list against storage and the execution
//! context. Server effects (`fetch`, `persist`, `call_service`, `set`) run
//! immediately; client effects are collected verbatim for the caller's UI.
//!
//! One dispatcher instance serves exactly one event. Effects run strictly
//! in caller order, and no effect is ever skipped because an earlier one
//! failed: effect-level problems degrade to null results and soft-failure
//! audit records. Only genuine storage backend faults propagate.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::binding::{resolve, resolve_deep};
use crate::context::EventContext;
use crate::effect::{Effect, EffectResult, PersistAction};
use crate::error::StorageResult;
use crate::storage::StorageProvider;

/// Single-use effect interpreter. Not safe to reuse or share across
/// concurrent events; create one per inbound event.
pub struct EffectDispatcher {
    storage: Arc<dyn StorageProvider>,
    data: Map<String, Value>,
    client_effects: Vec<Value>,
    effect_results: Vec<EffectResult>,
}

impl EffectDispatcher {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            storage,
            data: Map::new(),
            client_effects: Vec::new(),
            effect_results: Vec::new(),
        }
    }

    /// Last-fetched result per entity type.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Client effects collected so far, in request order.
    pub fn client_effects(&self) -> &[Value] {
        &self.client_effects
    }

    /// Audit trail of server-mutating effects, in execution order.
    pub fn effect_results(&self) -> &[EffectResult] {
        &self.effect_results
    }

    /// Consume the dispatcher, yielding `(data, clientEffects,
    /// effectResults)` for response packaging.
    pub fn into_outputs(self) -> (Map<String, Value>, Vec<Value>, Vec<EffectResult>) {
        (self.data, self.client_effects, self.effect_results)
    }

    /// Execute every effect in caller-supplied order.
    pub async fn run(
        &mut self,
        effects: &[Effect],
        context: &mut EventContext,
    ) -> StorageResult<()> {
        for effect in effects {
            self.execute(effect, context).await?;
        }
        Ok(())
    }

    /// Execute a single effect, returning its value when it produced one.
    pub async fn execute(
        &mut self,
        effect: &Effect,
        context: &mut EventContext,
    ) -> StorageResult<Option<Value>> {
        match effect {
            Effect::Fetch {
                entity_type,
                id,
                filter,
            } => self.fetch(entity_type, id.as_ref(), filter.as_ref(), context).await,

            Effect::Persist {
                action,
                entity_type,
                data,
            } => self.persist(*action, entity_type, data, context).await,

            Effect::CallService {
                service,
                method,
                args,
            } => Ok(Some(self.call_service(service, method, args, context))),

            Effect::Set { target, value } => Ok(self.set(target, value, context)),

            Effect::Client { raw } => {
                self.client_effects.push(raw.clone());
                Ok(None)
            }

            Effect::Unrecognized(raw) => {
                debug!(effect = %raw, "ignoring unrecognized effect");
                Ok(None)
            }
        }
    }

    async fn fetch(
        &mut self,
        entity_type: &str,
        id: Option<&Value>,
        filter: Option<&Value>,
        context: &EventContext,
    ) -> StorageResult<Option<Value>> {
        let result = match id {
            Some(id_spec) => {
                // Single-entity fetch; the id option may itself be a binding.
                match resolve(id_spec, context) {
                    Value::String(entity_id) => self
                        .storage
                        .get(entity_type, &entity_id)
                        .await?
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                }
            }
            None => {
                let entities = self.storage.list(entity_type, filter, context).await?;
                Value::Array(entities)
            }
        };

        self.data.insert(entity_type.to_string(), result.clone());
        Ok(non_null(result))
    }

    async fn persist(
        &mut self,
        action: PersistAction,
        entity_type: &str,
        data: &Value,
        context: &mut EventContext,
    ) -> StorageResult<Option<Value>> {
        let resolved = resolve_payload(data, context);

        let result = match action {
            PersistAction::Create => match resolved {
                Value::Object(fields) => Some(self.storage.create(entity_type, fields).await?),
                _ => None,
            },

            PersistAction::Update => {
                let entity_id = context
                    .entity_id()
                    .map(str::to_string)
                    .or_else(|| resolved.get("id").and_then(Value::as_str).map(str::to_string));
                match (entity_id, resolved) {
                    (Some(id), Value::Object(fields)) => {
                        Some(self.storage.update(entity_type, &id, fields).await?)
                    }
                    _ => None,
                }
            }

            PersistAction::Delete => match context.entity_id() {
                Some(id) => {
                    let id = id.to_string();
                    if self.storage.delete(entity_type, &id).await? {
                        Some(json!({"deleted": true, "id": id}))
                    } else {
                        None
                    }
                }
                None => None,
            },
        };

        self.effect_results.push(EffectResult::persist(
            action,
            entity_type,
            result.clone().unwrap_or(Value::Null),
            result.is_some(),
        ));
        Ok(result)
    }

    /// Placeholder for a service-call registry that does not exist yet.
    /// Returns a structured soft failure the caller can inspect.
    fn call_service(
        &mut self,
        service: &str,
        method: &str,
        args: &Value,
        context: &EventContext,
    ) -> Value {
        let _resolved_args = resolve_payload(args, context);
        let result = json!({
            "service": service,
            "method": method,
            "status": "not_implemented",
        });
        self.effect_results
            .push(EffectResult::call_service(service, method, result.clone()));
        result
    }

    fn set(&mut self, target: &str, value: &Value, context: &mut EventContext) -> Option<Value> {
        let resolved = resolve(value, context);

        if let Some(path) = target.strip_prefix('@') {
            let segments: Vec<&str> = path.split('.').collect();
            if let [root, rest @ ..] = segments.as_slice() {
                if !rest.is_empty() {
                    context.set_path(root, rest, resolved.clone());
                }
            }
        }

        // The audit record reports success even when the target was not a
        // usable binding; `set` never fails.
        self.effect_results
            .push(EffectResult::set(target, resolved.clone()));
        non_null(resolved)
    }
}

/// Resolve a persist/call_service payload: a binding string resolves as a
/// whole (`"@payload"`), a literal map has its fields resolved recursively.
fn resolve_payload(data: &Value, context: &EventContext) -> Value {
    match data {
        Value::Object(map) => Value::Object(resolve_deep(map, context)),
        other => resolve(other, context),
    }
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn dispatcher() -> (EffectDispatcher, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (EffectDispatcher::new(store.clone()), store)
    }

    async fn execute_raw(
        dispatcher: &mut EffectDispatcher,
        raw: Value,
        context: &mut EventContext,
    ) -> Option<Value> {
        dispatcher
            .execute(&Effect::parse(&raw), context)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_single_entity() {
        let (mut dispatcher, store) = dispatcher();
        store
            .create("Task", object(json!({"id": "task-1", "name": "Test Task"})))
            .await
            .unwrap();
        let mut ctx = EventContext::new();

        let result = execute_raw(
            &mut dispatcher,
            json!(["fetch", "Task", {"id": "task-1"}]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(result["name"], json!("Test Task"));
        assert_eq!(dispatcher.data()["Task"]["id"], json!("task-1"));
    }

    #[tokio::test]
    async fn test_fetch_single_via_binding() {
        let (mut dispatcher, store) = dispatcher();
        store
            .create("Task", object(json!({"id": "task-1", "name": "T"})))
            .await
            .unwrap();
        let mut ctx = EventContext::from_value(json!({"payload": {"taskId": "task-1"}}));

        let result = execute_raw(
            &mut dispatcher,
            json!(["fetch", "Task", {"id": "@payload.taskId"}]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(result["id"], json!("task-1"));
    }

    #[tokio::test]
    async fn test_fetch_miss_stores_null() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        let result = execute_raw(
            &mut dispatcher,
            json!(["fetch", "Task", {"id": "ghost"}]),
            &mut ctx,
        )
        .await;

        assert_eq!(result, None);
        assert_eq!(dispatcher.data()["Task"], Value::Null);
    }

    #[tokio::test]
    async fn test_fetch_collection_with_filter() {
        let (mut dispatcher, store) = dispatcher();
        store.seed(
            "Task",
            vec![
                object(json!({"name": "a", "status": "pending"})),
                object(json!({"name": "b", "status": "done"})),
            ],
        );
        let mut ctx = EventContext::from_value(json!({"payload": {}}));

        let result = execute_raw(
            &mut dispatcher,
            json!(["fetch", "Task", {"filter": ["=", "@entity.status", "pending"]}]),
            &mut ctx,
        )
        .await
        .unwrap();

        let list = result.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["status"], json!("pending"));
    }

    #[tokio::test]
    async fn test_persist_create_audits_and_generates_id() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        let result = execute_raw(
            &mut dispatcher,
            json!(["persist", "create", "Task", {"name": "T"}]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert!(result["id"].is_string());
        assert_eq!(dispatcher.effect_results().len(), 1);
        let audit = &dispatcher.effect_results()[0];
        assert_eq!(audit.action.as_deref(), Some("create"));
        assert!(audit.success);
    }

    #[tokio::test]
    async fn test_persist_create_resolves_payload_binding() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx =
            EventContext::from_value(json!({"payload": {"name": "From Payload", "status": "new"}}));

        let result = execute_raw(
            &mut dispatcher,
            json!(["persist", "create", "Task", "@payload"]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(result["name"], json!("From Payload"));
        assert_eq!(result["status"], json!("new"));
    }

    #[tokio::test]
    async fn test_persist_update_uses_context_entity_id() {
        let (mut dispatcher, store) = dispatcher();
        let created = store
            .create("Task", object(json!({"name": "Original", "status": "pending"})))
            .await
            .unwrap();
        let mut ctx = EventContext::from_value(json!({"entityId": created["id"]}));

        let result = execute_raw(
            &mut dispatcher,
            json!(["persist", "update", "Task", {"status": "completed"}]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(result["status"], json!("completed"));
        assert_eq!(result["name"], json!("Original"));
    }

    #[tokio::test]
    async fn test_persist_update_falls_back_to_data_id() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        let result = execute_raw(
            &mut dispatcher,
            json!(["persist", "update", "Task", {"id": "t9", "name": "T"}]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(result["id"], json!("t9"));
    }

    #[tokio::test]
    async fn test_persist_update_without_id_is_soft_failure() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        let result = execute_raw(
            &mut dispatcher,
            json!(["persist", "update", "Task", {"name": "T"}]),
            &mut ctx,
        )
        .await;

        assert_eq!(result, None);
        let audit = &dispatcher.effect_results()[0];
        assert!(!audit.success);
        assert_eq!(audit.data, Value::Null);
    }

    #[tokio::test]
    async fn test_persist_delete() {
        let (mut dispatcher, store) = dispatcher();
        let created = store
            .create("Task", object(json!({"name": "To Delete"})))
            .await
            .unwrap();
        let id = created["id"].clone();
        let mut ctx = EventContext::from_value(json!({"entityId": id}));

        let result = execute_raw(
            &mut dispatcher,
            json!(["persist", "delete", "Task"]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(result["deleted"], json!(true));
        assert_eq!(result["id"], id);
        assert_eq!(
            store.get("Task", id.as_str().unwrap()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_persist_delete_without_entity_id_is_soft_failure() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        let result = execute_raw(
            &mut dispatcher,
            json!(["persist", "delete", "Task"]),
            &mut ctx,
        )
        .await;

        assert_eq!(result, None);
        assert!(!dispatcher.effect_results()[0].success);
    }

    #[tokio::test]
    async fn test_call_service_not_implemented() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        let result = execute_raw(
            &mut dispatcher,
            json!(["call_service", "email", "send", {"to": "a@b.c"}]),
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(result["status"], json!("not_implemented"));
        let audit = &dispatcher.effect_results()[0];
        assert_eq!(audit.effect, "call_service");
        assert!(!audit.success);
    }

    #[tokio::test]
    async fn test_set_mutates_context_for_later_effects() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::from_value(json!({"entity": {"status": "pending"}}));

        execute_raw(
            &mut dispatcher,
            json!(["set", "@entity.status", "done"]),
            &mut ctx,
        )
        .await;

        assert_eq!(ctx.get("entity"), Some(&json!({"status": "done"})));
        assert!(dispatcher.effect_results()[0].success);

        // The mutation is visible to subsequent effects in the same list.
        let mut dispatcher2 = EffectDispatcher::new(Arc::new(MemoryStore::new()));
        let created = execute_raw(
            &mut dispatcher2,
            json!(["persist", "create", "Task", {"status": "@entity.status"}]),
            &mut ctx,
        )
        .await
        .unwrap();
        assert_eq!(created["status"], json!("done"));
    }

    #[tokio::test]
    async fn test_set_resolves_value_binding() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::from_value(json!({
            "entity": {"status": "pending"},
            "payload": {"next": "archived"}
        }));

        execute_raw(
            &mut dispatcher,
            json!(["set", "@entity.status", "@payload.next"]),
            &mut ctx,
        )
        .await;

        assert_eq!(
            ctx.get("entity").unwrap()["status"],
            json!("archived")
        );
    }

    #[tokio::test]
    async fn test_set_on_missing_root_still_succeeds() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        execute_raw(
            &mut dispatcher,
            json!(["set", "@draft.title", "hello"]),
            &mut ctx,
        )
        .await;

        assert!(dispatcher.effect_results()[0].success);
        assert_eq!(ctx.get("draft"), Some(&json!({"title": "hello"})));
    }

    #[tokio::test]
    async fn test_client_effects_collected_in_order() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();
        let effects = vec![
            json!(["notify", {"m": "a"}]),
            json!(["navigate", "/x"]),
            json!(["emit", "e", {}]),
        ];

        for raw in &effects {
            execute_raw(&mut dispatcher, raw.clone(), &mut ctx).await;
        }

        assert_eq!(dispatcher.client_effects(), effects.as_slice());
        assert!(dispatcher.effect_results().is_empty());
    }

    #[tokio::test]
    async fn test_render_ui_spellings() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        execute_raw(&mut dispatcher, json!(["render_ui", "slot1", {}]), &mut ctx).await;
        execute_raw(&mut dispatcher, json!(["render-ui", "slot2", {}]), &mut ctx).await;

        assert_eq!(dispatcher.client_effects().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_and_empty_effects_are_no_ops() {
        let (mut dispatcher, _) = dispatcher();
        let mut ctx = EventContext::new();

        assert_eq!(
            execute_raw(&mut dispatcher, json!(["unknown_effect", "arg"]), &mut ctx).await,
            None
        );
        assert_eq!(execute_raw(&mut dispatcher, json!([]), &mut ctx).await, None);
        assert!(dispatcher.client_effects().is_empty());
        assert!(dispatcher.effect_results().is_empty());
    }
}
