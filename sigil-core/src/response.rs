//! Event request/response wire types
//!
//! The event endpoint contract: the caller supplies the effect list chosen
//! by the trait layer plus the event payload; the response packages
//! everything the dispatcher produced. Field names follow the wire
//! convention (camelCase).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::EventContext;
use crate::dispatch::EffectDispatcher;
use crate::effect::{Effect, EffectResult};
use crate::storage::StorageProvider;

/// Body of an inbound event request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRequest {
    #[serde(default)]
    pub payload: Map<String, Value>,

    #[serde(rename = "entityId", default)]
    pub entity_id: Option<String>,

    /// Effects to execute, in order, as wire arrays. Supplied by the
    /// state-machine layer that routed this event.
    #[serde(default)]
    pub effects: Vec<Value>,

    /// State the entity transitions to, per the routing layer. Falls back
    /// to the event name when omitted.
    #[serde(rename = "newState", default)]
    pub new_state: Option<String>,
}

/// Standard event response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub success: bool,
    pub new_state: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub client_effects: Vec<Value>,
    #[serde(default)]
    pub effect_results: Vec<EffectResult>,
    pub error: Option<String>,
}

/// Run a fresh dispatcher over an effect list and package its outputs.
///
/// Effect-level failures never surface here (they degrade inside the
/// dispatcher); only a storage backend fault turns the response into
/// `success=false` with the error message, keeping whatever the dispatcher
/// accumulated before the fault.
pub async fn process_effects(
    storage: Arc<dyn StorageProvider>,
    effects: &[Value],
    context: &mut EventContext,
    new_state: impl Into<String>,
) -> EventResponse {
    let parsed = Effect::parse_list(effects);
    let mut dispatcher = EffectDispatcher::new(storage);

    let error = dispatcher
        .run(&parsed, context)
        .await
        .err()
        .map(|err| err.to_string());
    let (data, client_effects, effect_results) = dispatcher.into_outputs();

    EventResponse {
        success: error.is_none(),
        new_state: new_state.into(),
        data,
        client_effects,
        effect_results,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentStore, MemoryStore};
    use serde_json::json;

    #[tokio::test]
    async fn test_process_effects_packages_outputs() {
        let storage = Arc::new(MemoryStore::new());
        let mut context = EventContext::for_event(
            json!({"name": "T"}).as_object().unwrap().clone(),
            None,
        );
        let effects = vec![
            json!(["persist", "create", "Task", "@payload"]),
            json!(["fetch", "Task"]),
            json!(["notify", {"message": "created"}]),
        ];

        let response = process_effects(storage, &effects, &mut context, "created").await;

        assert!(response.success);
        assert_eq!(response.new_state, "created");
        assert_eq!(response.error, None);
        assert_eq!(response.data["Task"].as_array().unwrap().len(), 1);
        assert_eq!(response.client_effects, vec![json!(["notify", {"message": "created"}])]);
        assert_eq!(response.effect_results.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_fault_reported_in_response() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        let mut context = EventContext::new();
        // ".." is rejected as a storage key, a genuine backend error.
        let effects = vec![json!(["persist", "create", "..", {"name": "T"}])];

        let response = process_effects(storage, &effects, &mut context, "same").await;

        assert!(!response.success);
        assert!(response.error.unwrap().contains("invalid storage key"));
    }

    #[test]
    fn test_response_wire_shape() {
        let response = EventResponse {
            success: true,
            new_state: "done".to_string(),
            data: Map::new(),
            client_effects: vec![],
            effect_results: vec![],
            error: None,
        };

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire,
            json!({
                "success": true,
                "newState": "done",
                "data": {},
                "clientEffects": [],
                "effectResults": [],
                "error": null
            })
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: EventRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.payload.is_empty());
        assert_eq!(request.entity_id, None);
        assert!(request.effects.is_empty());
        assert_eq!(request.new_state, None);
    }
}
