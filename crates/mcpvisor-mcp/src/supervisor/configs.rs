//! Adding, editing and removing server definitions.

use mcpvisor_core::{McpError, ServerConfig, ServerStatus, SupervisorEvent};
use tracing::{info, warn};

use super::Supervisor;

/// What an edit means for a running server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Disable,
    Enable,
    Restart,
    Refresh,
    StayDisabled,
}

impl Transition {
    fn between(previous: &ServerConfig, next: &ServerConfig) -> Self {
        match (previous.enabled, next.enabled) {
            (true, false) => Self::Disable,
            (false, true) => Self::Enable,
            (true, true) if previous.launch_differs(next) => Self::Restart,
            (true, true) => Self::Refresh,
            (false, false) => Self::StayDisabled,
        }
    }
}

impl Supervisor {
    /// Add a server definition, persist it, and connect it if enabled.
    ///
    /// A connect failure is reported through the server's status, not here.
    pub async fn add_server_config(&self, config: ServerConfig) -> Result<(), McpError> {
        config.validate().map_err(McpError::InvalidConfig)?;

        let mut state = self.state().await;
        if state.config_by_name(&config.name).is_some() {
            return Err(McpError::DuplicateServer(config.name));
        }
        if state.configs.iter().any(|c| c.id == config.id) {
            return Err(McpError::InvalidConfig(format!(
                "server id '{}' is already in use",
                config.id
            )));
        }

        state.configs.push(config.clone());
        state.invalidate_caches();
        let status = if config.enabled {
            ServerStatus::Idle
        } else {
            ServerStatus::Disabled
        };
        self.set_status(&mut state, &config.name, status);
        info!(server_name = %config.name, "Added MCP server");
        self.persist(state).await;

        if config.enabled {
            self.connect_logged(config, true).await;
        }
        Ok(())
    }

    /// Replace the definition with the same id.
    ///
    /// - enabled to disabled: disconnect
    /// - disabled to enabled: connect
    /// - launch parameters or name changed while enabled: restart under the
    ///   new definition, without auto-disable so a bad edit shows as an error
    /// - otherwise the status is refreshed
    pub async fn update_server_config(&self, config: ServerConfig) -> Result<(), McpError> {
        config.validate().map_err(McpError::InvalidConfig)?;

        let mut state = self.state().await;
        let index = state
            .configs
            .iter()
            .position(|c| c.id == config.id)
            .ok_or_else(|| McpError::UnknownServer(config.name.clone()))?;
        if state
            .configs
            .iter()
            .any(|c| c.id != config.id && c.name == config.name)
        {
            return Err(McpError::DuplicateServer(config.name));
        }

        let previous = std::mem::replace(&mut state.configs[index], config.clone());
        state.invalidate_caches();

        let transition = Transition::between(&previous, &config);
        let renamed = previous.name != config.name;

        // Anything live under the old name goes away on disable, restart or rename
        let detach = renamed || matches!(transition, Transition::Disable | Transition::Restart);
        let old_connection = if detach {
            state.take_connection(&previous.name)
        } else {
            None
        };
        if renamed {
            state.statuses.remove(&previous.name);
            self.emit(SupervisorEvent::ServerRemoved {
                server_name: previous.name.clone(),
            });
        }

        match transition {
            Transition::Disable | Transition::StayDisabled => {
                self.set_status(&mut state, &config.name, ServerStatus::Disabled);
            }
            Transition::Enable => self.set_status(&mut state, &config.name, ServerStatus::Idle),
            Transition::Restart => {}
            Transition::Refresh => {
                let status = state
                    .statuses
                    .get(&config.name)
                    .map(|s| s.status.clone())
                    .unwrap_or_default();
                self.set_status(&mut state, &config.name, status);
            }
        }

        info!(server_name = %config.name, ?transition, "Updated MCP server");
        self.persist(state).await;

        if let Some(connection) = old_connection {
            connection.disconnect().await;
        }

        match transition {
            Transition::Enable => self.connect_logged(config, true).await,
            Transition::Restart => self.connect_logged(config, false).await,
            Transition::Refresh if renamed => self.connect_logged(config, false).await,
            _ => {}
        }
        Ok(())
    }

    /// Remove the definition with `id`, disconnecting its server.
    pub async fn remove_server_config(&self, id: &str) -> Result<(), McpError> {
        let mut state = self.state().await;
        let index = state
            .configs
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| McpError::UnknownServer(id.to_string()))?;

        let removed = state.configs.remove(index);
        let connection = state.take_connection(&removed.name);
        state.statuses.remove(&removed.name);
        state.invalidate_caches();

        self.emit(SupervisorEvent::ServerRemoved {
            server_name: removed.name.clone(),
        });
        info!(server_name = %removed.name, "Removed MCP server");
        self.persist(state).await;

        if let Some(connection) = connection {
            connection.disconnect().await;
        }
        Ok(())
    }

    async fn connect_logged(&self, config: ServerConfig, auto_disable: bool) {
        let name = config.name.clone();
        if let Err(e) = self.connect_server(config, auto_disable).await {
            warn!(server_name = %name, error = %e, "Failed to connect MCP server");
        }
    }
}
