//! Effect model
//!
//! Effects arrive on the wire as JSON arrays, `[tag, ...args]`, with the tag
//! always a string in the first slot. They are parsed once at the boundary
//! into a closed sum type; anything that does not match a known tag and
//! shape lands in [`Effect::Unrecognized`], which the dispatcher treats as a
//! no-op. Unknown effects are a contract, not a failure: a typo'd tag must
//! never abort the rest of the effect list.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Mutation action for the `persist` effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistAction {
    Create,
    Update,
    Delete,
}

impl PersistAction {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A single parsed effect.
///
/// Client-bound variants keep the raw wire array so they can be re-emitted
/// verbatim in `clientEffects`.
#[derive(Debug, Clone)]
pub enum Effect {
    /// `["fetch", entityType, {id?, filter?}]`
    Fetch {
        entity_type: String,
        /// Unresolved `id` option; may be a binding string.
        id: Option<Value>,
        /// Raw filter expression, passed through to storage untouched.
        filter: Option<Value>,
    },

    /// `["persist", action, entityType, data?]`
    Persist {
        action: PersistAction,
        entity_type: String,
        data: Value,
    },

    /// `["call_service", service, method, args?]`
    CallService {
        service: String,
        method: String,
        args: Value,
    },

    /// `["set", "@root.path", value]`
    Set { target: String, value: Value },

    /// `render_ui`/`render-ui`, `navigate`, `notify`, `emit`: collected for
    /// the caller, never interpreted server-side. `emit` is dual-purpose in
    /// the execution model but today behaves like the other client tags.
    Client { raw: Value },

    /// Empty, malformed, or unknown-tag effect. Executes as a no-op.
    Unrecognized(Value),
}

const CLIENT_TAGS: &[&str] = &["render_ui", "render-ui", "navigate", "notify", "emit"];

impl Effect {
    /// Parse one wire effect. Never fails; shapes that don't match a known
    /// tag become [`Effect::Unrecognized`].
    pub fn parse(raw: &Value) -> Effect {
        let unrecognized = || Effect::Unrecognized(raw.clone());

        let Some(items) = raw.as_array() else {
            return unrecognized();
        };
        let Some(tag) = items.first().and_then(Value::as_str) else {
            return unrecognized();
        };
        let args = &items[1..];

        match tag {
            "fetch" => {
                let Some(entity_type) = args.first().and_then(Value::as_str) else {
                    return unrecognized();
                };
                let options = args.get(1).and_then(Value::as_object);
                Effect::Fetch {
                    entity_type: entity_type.to_string(),
                    id: options.and_then(|o| o.get("id")).cloned(),
                    filter: options.and_then(|o| o.get("filter")).cloned(),
                }
            }

            "persist" => {
                let action = args
                    .first()
                    .and_then(Value::as_str)
                    .and_then(PersistAction::parse);
                let entity_type = args.get(1).and_then(Value::as_str);
                let (Some(action), Some(entity_type)) = (action, entity_type) else {
                    return unrecognized();
                };
                Effect::Persist {
                    action,
                    entity_type: entity_type.to_string(),
                    data: args.get(2).cloned().unwrap_or_else(|| json!({})),
                }
            }

            "call_service" => {
                let service = args.first().and_then(Value::as_str);
                let method = args.get(1).and_then(Value::as_str);
                let (Some(service), Some(method)) = (service, method) else {
                    return unrecognized();
                };
                Effect::CallService {
                    service: service.to_string(),
                    method: method.to_string(),
                    args: args.get(2).cloned().unwrap_or_else(|| json!({})),
                }
            }

            "set" => {
                let Some(target) = args.first().and_then(Value::as_str) else {
                    return unrecognized();
                };
                Effect::Set {
                    target: target.to_string(),
                    value: args.get(1).cloned().unwrap_or(Value::Null),
                }
            }

            tag if CLIENT_TAGS.contains(&tag) => Effect::Client { raw: raw.clone() },

            _ => unrecognized(),
        }
    }

    /// Parse a whole effect list.
    pub fn parse_list(raws: &[Value]) -> Vec<Effect> {
        raws.iter().map(Effect::parse).collect()
    }
}

/// Audit record appended for every server-mutating effect.
///
/// One ordered audit log exists per dispatcher instance; it is returned to
/// the caller in `effectResults` and discarded with the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectResult {
    pub effect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(
        rename = "entityType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub data: Value,
    pub success: bool,
}

impl EffectResult {
    pub fn persist(action: PersistAction, entity_type: &str, data: Value, success: bool) -> Self {
        Self {
            effect: "persist".to_string(),
            action: Some(action.as_str().to_string()),
            entity_type: Some(entity_type.to_string()),
            service: None,
            method: None,
            target: None,
            data,
            success,
        }
    }

    pub fn call_service(service: &str, method: &str, data: Value) -> Self {
        Self {
            effect: "call_service".to_string(),
            action: None,
            entity_type: None,
            service: Some(service.to_string()),
            method: Some(method.to_string()),
            target: None,
            data,
            success: false,
        }
    }

    pub fn set(target: &str, value: Value) -> Self {
        Self {
            effect: "set".to_string(),
            action: None,
            entity_type: None,
            service: None,
            method: None,
            target: Some(target.to_string()),
            data: value,
            success: true,
        }
    }
}
