//! Volatile in-memory storage backend

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::EventContext;
use crate::error::StorageResult;

use super::{effective_filter, StorageProvider};

/// In-memory backend for tests and development. Nothing survives the
/// process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a set of entities for tests, assigning ids where missing.
    pub fn seed(&self, entity_type: &str, entities: Vec<Map<String, Value>>) {
        let mut store = self.entities.write();
        let bucket = store.entry(entity_type.to_string()).or_default();
        for mut entity in entities {
            let id = stored_id(&entity).unwrap_or_else(new_id);
            entity.insert("id".to_string(), Value::String(id.clone()));
            bucket.insert(id, Value::Object(entity));
        }
    }
}

fn stored_id(data: &Map<String, Value>) -> Option<String> {
    data.get("id").and_then(Value::as_str).map(str::to_string)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl StorageProvider for MemoryStore {
    async fn get(&self, entity_type: &str, id: &str) -> StorageResult<Option<Value>> {
        let store = self.entities.read();
        Ok(store
            .get(entity_type)
            .and_then(|bucket| bucket.get(id))
            .cloned())
    }

    async fn list(
        &self,
        entity_type: &str,
        filter: Option<&Value>,
        context: &EventContext,
    ) -> StorageResult<Vec<Value>> {
        let store = self.entities.read();
        let entities: Vec<Value> = store
            .get(entity_type)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default();

        match effective_filter(filter, context) {
            Some(filter) => Ok(entities
                .into_iter()
                .filter(|entity| filter.matches(entity))
                .collect()),
            None => Ok(entities),
        }
    }

    async fn create(&self, entity_type: &str, mut data: Map<String, Value>) -> StorageResult<Value> {
        let id = stored_id(&data).unwrap_or_else(new_id);
        data.insert("id".to_string(), Value::String(id.clone()));
        let entity = Value::Object(data);

        let mut store = self.entities.write();
        store
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, entity.clone());

        Ok(entity)
    }

    async fn update(
        &self,
        entity_type: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> StorageResult<Value> {
        let mut store = self.entities.write();
        let bucket = store.entry(entity_type.to_string()).or_default();

        let entity = match bucket.get_mut(id) {
            Some(Value::Object(existing)) => {
                for (key, value) in data {
                    existing.insert(key, value);
                }
                existing.insert("id".to_string(), Value::String(id.to_string()));
                Value::Object(existing.clone())
            }
            _ => {
                // Upsert: a missing id creates the entity with that id.
                let mut fresh = data;
                fresh.insert("id".to_string(), Value::String(id.to_string()));
                let entity = Value::Object(fresh);
                bucket.insert(id.to_string(), entity.clone());
                entity
            }
        };

        Ok(entity)
    }

    async fn delete(&self, entity_type: &str, id: &str) -> StorageResult<bool> {
        let mut store = self.entities.write();
        Ok(store
            .get_mut(entity_type)
            .and_then(|bucket| bucket.remove(id))
            .is_some())
    }
}
