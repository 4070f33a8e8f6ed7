//! Durable document storage backend
//!
//! One JSON document per entity at `<root>/<entityType>/<id>.json`. The
//! file name is the surrogate key: the write path strips a caller-supplied
//! `id` field before serializing the body (so the key is never duplicated
//! inside the document), and the read path re-attaches `id` from the file
//! name. The restricted filter grammar is translated into a predicate
//! applied during the directory scan.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::EventContext;
use crate::error::{StorageError, StorageResult};

use super::{effective_filter, StorageProvider};

/// Filesystem-backed document store.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| StorageError::Io {
                path: root.clone(),
                source,
            })?;
        Ok(Self { root })
    }

    fn type_dir(&self, entity_type: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(checked_component(entity_type)?))
    }

    fn doc_path(&self, entity_type: &str, id: &str) -> StorageResult<PathBuf> {
        Ok(self
            .type_dir(entity_type)?
            .join(format!("{}.json", checked_component(id)?)))
    }

    async fn read_doc(&self, path: &Path) -> StorageResult<Option<Map<String, Value>>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let body: Map<String, Value> =
            serde_json::from_str(&raw).map_err(|source| StorageError::CorruptDocument {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Some(body))
    }

    async fn write_doc(
        &self,
        entity_type: &str,
        id: &str,
        mut body: Map<String, Value>,
    ) -> StorageResult<Value> {
        // The id lives in the file name, not the document body.
        body.remove("id");

        let dir = self.type_dir(entity_type)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = self.doc_path(entity_type, id)?;
        let raw = serde_json::to_string_pretty(&Value::Object(body.clone()))
            .expect("entity maps always serialize");
        tokio::fs::write(&path, raw)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        body.insert("id".to_string(), Value::String(id.to_string()));
        Ok(Value::Object(body))
    }
}

/// Validate an entity type or id before it becomes a path component.
fn checked_component(name: &str) -> StorageResult<&str> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\') || c.is_control());
    if valid {
        Ok(name)
    } else {
        Err(StorageError::InvalidKey(name.to_string()))
    }
}

fn attach_id(mut body: Map<String, Value>, id: &str) -> Value {
    body.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(body)
}

#[async_trait]
impl StorageProvider for DocumentStore {
    async fn get(&self, entity_type: &str, id: &str) -> StorageResult<Option<Value>> {
        let path = self.doc_path(entity_type, id)?;
        Ok(self.read_doc(&path).await?.map(|body| attach_id(body, id)))
    }

    async fn list(
        &self,
        entity_type: &str,
        filter: Option<&Value>,
        context: &EventContext,
    ) -> StorageResult<Vec<Value>> {
        let dir = self.type_dir(entity_type)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: dir, source }),
        };

        let predicate = effective_filter(filter, context);
        let mut entities = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some(body) = self.read_doc(&path).await? {
                let entity = attach_id(body, id);
                if predicate.as_ref().map_or(true, |p| p.matches(&entity)) {
                    entities.push(entity);
                }
            }
        }

        Ok(entities)
    }

    async fn create(&self, entity_type: &str, data: Map<String, Value>) -> StorageResult<Value> {
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.write_doc(entity_type, &id, data).await
    }

    async fn update(
        &self,
        entity_type: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> StorageResult<Value> {
        let path = self.doc_path(entity_type, id)?;
        // Upsert: merge into the existing document when present, otherwise
        // start from the given fields.
        let mut body = self.read_doc(&path).await?.unwrap_or_default();
        for (key, value) in data {
            body.insert(key, value);
        }
        self.write_doc(entity_type, id, body).await
    }

    async fn delete(&self, entity_type: &str, id: &str) -> StorageResult<bool> {
        let path = self.doc_path(entity_type, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
