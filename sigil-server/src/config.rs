use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use sigil_core::{DocumentStore, MemoryStore, StorageProvider};

use crate::cli::Cli;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Document,
}

impl StorageBackend {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "document" => Self::Document,
            _ => Self::Memory,
        }
    }
}

/// Runtime configuration derived from CLI/env.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub environment: String,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let data_dir = if cli.data_dir.is_relative() {
            std::env::current_dir()?.join(&cli.data_dir)
        } else {
            cli.data_dir.clone()
        };

        Ok(Self {
            listen_addr: cli.listen_addr.clone(),
            backend: StorageBackend::from_str(&cli.storage),
            data_dir,
            environment: cli.environment.clone(),
        })
    }

    /// Construct the configured storage provider.
    pub async fn build_storage(&self) -> Result<Arc<dyn StorageProvider>> {
        Ok(match self.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Document => Arc::new(DocumentStore::open(&self.data_dir).await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing_defaults_to_memory() {
        assert_eq!(StorageBackend::from_str("document"), StorageBackend::Document);
        assert_eq!(StorageBackend::from_str("Document"), StorageBackend::Document);
        assert_eq!(StorageBackend::from_str("memory"), StorageBackend::Memory);
        assert_eq!(StorageBackend::from_str("firestore"), StorageBackend::Memory);
    }
}
