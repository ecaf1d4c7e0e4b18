//! Server definitions kept in a JSON file.
//!
//! ```json
//! { "servers": [ { "id": "...", "name": "fs", "command": "npx", "args": ["-y", "..."] } ] }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mcpvisor_core::{ConfigStoreError, ServerConfig, ServerConfigStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ServersDocument {
    #[serde(default)]
    servers: Vec<ServerConfig>,
}

/// [`ServerConfigStore`] backed by one JSON file.
///
/// A missing file loads as an empty list. Saves write a sibling temp file and
/// rename it over the original, so readers never see a partial document.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, e: &std::io::Error) -> ConfigStoreError {
        ConfigStoreError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ServerConfigStore for JsonFileConfigStore {
    async fn load(&self) -> Result<Vec<ServerConfig>, ConfigStoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No server definition file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(&e)),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: ServersDocument =
            serde_json::from_str(&raw).map_err(|e| ConfigStoreError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(document.servers)
    }

    async fn save(&self, servers: &[ServerConfig]) -> Result<(), ConfigStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(&e))?;
        }

        let document = ServersDocument {
            servers: servers.to_vec(),
        };
        let mut body = serde_json::to_string_pretty(&document).map_err(|e| {
            ConfigStoreError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        body.push('\n');

        let temp = self.temp_path();
        tokio::fs::write(&temp, body)
            .await
            .map_err(|e| self.io_error(&e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(&e))?;

        debug!(path = %self.path.display(), count = servers.len(), "Saved server definitions");
        Ok(())
    }
}
