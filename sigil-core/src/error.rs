//! Error types for core operations

use std::path::PathBuf;

/// Errors surfaced by storage providers.
///
/// Effect-level problems (missing entities, malformed filters, unknown tags)
/// never appear here; those degrade to null results by contract. This enum
/// covers genuine backend faults only.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage key component: {0:?}")]
    InvalidKey(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt document at {path}: {source}")]
    CorruptDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
