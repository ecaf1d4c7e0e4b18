//! CLI bootstrap - the composition root.
//!
//! The file store and the supervisor are created here; handlers only see the
//! resulting [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mcpvisor_core::{SupervisorEvent, SupervisorEventEmitter, default_config_path};
use mcpvisor_mcp::Supervisor;
use tracing::{debug, info, warn};

use crate::config_store::JsonFileConfigStore;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Server definition file.
    pub config_path: PathBuf,
}

impl CliConfig {
    /// Use `config_path` if given, else the default location.
    pub fn resolve(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path().context("Cannot locate the server definition file")?,
        };
        Ok(Self { config_path })
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub supervisor: Supervisor,
    pub store: Arc<JsonFileConfigStore>,
}

impl CliContext {
    pub const fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }
}

/// Load the server definitions and build the supervisor over them.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let store = Arc::new(JsonFileConfigStore::new(config.config_path));
    debug!(path = %store.path().display(), "Loading server definitions");

    let supervisor = Supervisor::load(store.clone(), Arc::new(LogEmitter))
        .await
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    Ok(CliContext { supervisor, store })
}

/// Emitter for a terminal session: supervisor events go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmitter;

impl SupervisorEventEmitter for LogEmitter {
    fn emit(&self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::StatusChanged {
                server_name,
                status,
            } => debug!(server_name = %server_name, status = %status.status, "Server status changed"),
            SupervisorEvent::CatalogUpdated {
                server_name,
                tool_count,
                resource_count,
            } => debug!(server_name = %server_name, tool_count, resource_count, "Catalog updated"),
            SupervisorEvent::ServerAutoDisabled {
                server_name,
                reason,
            } => warn!(server_name = %server_name, reason = %reason, "Server disabled after repeated failures"),
            SupervisorEvent::ServerRemoved { server_name } => {
                info!(server_name = %server_name, "Server removed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpvisor_core::{ServerConfig, ServerConfigStore};
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let config = CliConfig::resolve(Some(PathBuf::from("/tmp/x.json"))).unwrap();
        assert_eq!(config.config_path, PathBuf::from("/tmp/x.json"));
    }

    #[tokio::test]
    async fn test_bootstrap_loads_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.json");
        JsonFileConfigStore::new(&path)
            .save(&[ServerConfig::new("fs", "fs-server", vec![]).with_enabled(false)])
            .await
            .unwrap();

        let ctx = bootstrap(CliConfig { config_path: path }).await.unwrap();

        let configs = ctx.supervisor().server_configs().await;
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "fs");
    }
}
