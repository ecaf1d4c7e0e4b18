//! Server definition persistence port.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::ServerConfig;

/// Errors raised by a config store implementation.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("Failed to access config file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Loads and saves the full list of server definitions.
///
/// `save()` replaces the stored list atomically; there is no per-server API
/// because the supervisor always owns the complete, ordered list.
#[async_trait]
pub trait ServerConfigStore: Send + Sync {
    /// Load every stored definition.
    async fn load(&self) -> Result<Vec<ServerConfig>, ConfigStoreError>;

    /// Replace the stored definitions.
    async fn save(&self, servers: &[ServerConfig]) -> Result<(), ConfigStoreError>;
}

/// Store that keeps definitions in memory only.
///
/// Suitable for tests and embedders that persist configuration elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    servers: RwLock<Vec<ServerConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_servers(servers: Vec<ServerConfig>) -> Self {
        Self {
            servers: RwLock::new(servers),
        }
    }

    /// Current contents, for assertions.
    pub async fn snapshot(&self) -> Vec<ServerConfig> {
        self.servers.read().await.clone()
    }
}

#[async_trait]
impl ServerConfigStore for InMemoryConfigStore {
    async fn load(&self) -> Result<Vec<ServerConfig>, ConfigStoreError> {
        Ok(self.servers.read().await.clone())
    }

    async fn save(&self, servers: &[ServerConfig]) -> Result<(), ConfigStoreError> {
        *self.servers.write().await = servers.to_vec();
        Ok(())
    }
}
