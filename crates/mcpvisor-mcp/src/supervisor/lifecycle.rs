//! Connect, retry, auto-disable, reconnect and disconnect.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::{BoxFuture, join_all};
use mcpvisor_core::{McpError, ServerConfig, ServerStatus, SupervisorEvent, Tool};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Supervisor;
use super::state::SupervisorState;
use crate::connection::Connection;

impl Supervisor {
    /// Connect a configured server, retrying with backoff.
    ///
    /// After every attempt has failed the server is disabled in
    /// configuration (and the change persisted) so it stops being retried.
    /// A disabled config is not connected; its status just settles to
    /// `disabled`. A server that already has a connect in flight is left to
    /// that attempt.
    pub async fn connect_to_server(&self, config: &ServerConfig) -> Result<(), McpError> {
        self.connect_server(config.clone(), true).await
    }

    /// Connect every enabled server concurrently.
    ///
    /// Returns the servers that could not be connected, with their errors.
    pub async fn connect_to_all_enabled_servers(&self) -> Vec<(String, McpError)> {
        let configs: Vec<ServerConfig> = self
            .state()
            .await
            .configs
            .iter()
            .filter(|c| c.enabled)
            .cloned()
            .collect();

        let outcomes = join_all(configs.into_iter().map(|config| async move {
            let name = config.name.clone();
            (name, self.connect_server(config, true).await)
        }))
        .await;

        outcomes
            .into_iter()
            .filter_map(|(name, outcome)| outcome.err().map(|e| (name, e)))
            .collect()
    }

    /// Disconnect one server. Its status becomes `idle`, or `disabled` if it
    /// is disabled in configuration.
    pub async fn disconnect_server(&self, server_name: &str) {
        let connection = {
            let mut state = self.state().await;
            let connection = state.take_connection(server_name);
            if let Some(enabled) = state.config_by_name(server_name).map(|c| c.enabled) {
                let status = if enabled {
                    ServerStatus::Idle
                } else {
                    ServerStatus::Disabled
                };
                self.set_status(&mut state, server_name, status);
            }
            connection
        };

        if let Some(connection) = connection {
            connection.disconnect().await;
            info!(server_name = %server_name, "Disconnected MCP server");
        }
    }

    pub async fn disconnect_all_servers(&self) {
        let connections: Vec<Arc<Connection>> = {
            let mut state = self.state().await;
            let names: HashSet<String> = state
                .connections
                .keys()
                .chain(state.pending_reconnects.keys())
                .cloned()
                .collect();

            let mut connections = Vec::new();
            for name in names {
                if let Some(connection) = state.take_connection(&name) {
                    connections.push(connection);
                }
                if let Some(enabled) = state.config_by_name(&name).map(|c| c.enabled) {
                    let status = if enabled {
                        ServerStatus::Idle
                    } else {
                        ServerStatus::Disabled
                    };
                    self.set_status(&mut state, &name, status);
                }
            }
            connections
        };

        join_all(connections.iter().map(|c| c.disconnect())).await;
    }

    /// Restart a server: disconnect, then connect without auto-disable.
    pub async fn reconnect_server(&self, server_name: &str) -> Result<(), McpError> {
        let config = self
            .state()
            .await
            .config_by_name(server_name)
            .cloned()
            .ok_or_else(|| McpError::UnknownServer(server_name.to_string()))?;

        self.disconnect_server(server_name).await;
        self.connect_server(config, false).await
    }

    /// Disconnect everything and stop processing connection events.
    pub async fn shutdown(&self) {
        self.disconnect_all_servers().await;
        self.inner.shutdown.cancel();
        info!("MCP supervisor shut down");
    }

    /// Connect to `config` once, list its tools and disconnect again.
    ///
    /// Does not touch the catalog or statuses; for validating a definition
    /// before it is added.
    pub async fn test_connection(&self, config: &ServerConfig) -> Result<Vec<Tool>, McpError> {
        config.validate().map_err(McpError::InvalidConfig)?;

        // Nobody supervises a throwaway connection
        let (events, _) = mpsc::unbounded_channel();
        let connection = self.inner.connector.connect(config, events).await?;
        let tools = connection.list_tools().await;
        connection.disconnect().await;

        tools
    }

    /// The connect sequence. Boxed because a connect that finds its config
    /// changed underneath it starts over with the new one.
    pub(super) fn connect_server(
        &self,
        config: ServerConfig,
        auto_disable: bool,
    ) -> BoxFuture<'_, Result<(), McpError>> {
        Box::pin(async move {
            let name = config.name.clone();

            let (stale, claim) = {
                let mut state = self.state().await;

                if state.config_by_name(&name).is_none() {
                    return Err(McpError::UnknownServer(name));
                }

                if !config.enabled {
                    self.set_status(&mut state, &name, ServerStatus::Disabled);
                    return Ok(());
                }

                if let Some(existing) = state.connections.get(&name).cloned() {
                    if existing.is_connected() {
                        if state.tool_count(&name) == 0 {
                            drop(state);
                            self.discover_on(&existing).await;
                        } else {
                            self.set_status(&mut state, &name, ServerStatus::Connected);
                        }
                        return Ok(());
                    }
                }

                let Some(claim) = self.claim_in_flight(&name) else {
                    debug!(server_name = %name, "Connect already in progress");
                    return Ok(());
                };

                // A user-initiated connect supersedes a scheduled one
                let stale = state.take_connection(&name);
                self.set_status(&mut state, &name, ServerStatus::Connecting);
                (stale, claim)
            };

            if let Some(stale) = stale {
                stale.disconnect().await;
            }

            match self.attempt_connect(&config).await {
                Ok(connection) => {
                    let mut state = self.state().await;
                    let current = state.config_by_name(&name).cloned();

                    match current {
                        // Died before it was registered, so its termination was ignored
                        Some(current)
                            if current.enabled
                                && !current.launch_differs(&config)
                                && !connection.is_connected() =>
                        {
                            state.connections.remove(&name);
                            state.strip_catalog(&name);
                            state
                                .statuses
                                .entry(name.clone())
                                .or_default()
                                .note_error("server exited right after the handshake");
                            self.set_status(&mut state, &name, ServerStatus::Reconnecting);
                            self.schedule_reconnect(&mut state, &name);
                            drop(state);
                            drop(claim);

                            warn!(server_name = %name, "MCP server exited before registration");
                            connection.disconnect().await;
                            Ok(())
                        }
                        Some(current) if current.enabled && !current.launch_differs(&config) => {
                            state.connections.insert(name.clone(), Arc::clone(&connection));
                            state.invalidate_caches();
                            self.set_status(&mut state, &name, ServerStatus::Connected);
                            drop(state);
                            drop(claim);

                            self.discover_on(&connection).await;
                            Ok(())
                        }
                        Some(current) if current.enabled => {
                            drop(state);
                            drop(claim);
                            debug!(server_name = %name, "Config changed while connecting; restarting");
                            connection.disconnect().await;
                            self.connect_server(current, false).await
                        }
                        Some(_) => {
                            self.set_status(&mut state, &name, ServerStatus::Disabled);
                            drop(state);
                            debug!(server_name = %name, "Server disabled while connecting");
                            connection.disconnect().await;
                            Ok(())
                        }
                        None => {
                            drop(state);
                            debug!(server_name = %name, "Server removed while connecting");
                            connection.disconnect().await;
                            Ok(())
                        }
                    }
                }
                Err(error) => {
                    let state = self.state().await;

                    if let Some(current) = state.config_by_name(&name).cloned() {
                        if current.enabled && current.launch_differs(&config) {
                            drop(state);
                            drop(claim);
                            return self.connect_server(current, false).await;
                        }
                    }

                    self.give_up(state, &name, &error, auto_disable).await;
                    Err(error)
                }
            }
        })
    }

    /// Up to `max_connect_attempts` connects with backoff in between.
    async fn attempt_connect(&self, config: &ServerConfig) -> Result<Arc<Connection>, McpError> {
        let settings = &self.inner.settings;
        let max_attempts = settings.max_connect_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self
                .inner
                .connector
                .connect(config, self.inner.events_tx.clone())
                .await
            {
                Ok(connection) => {
                    info!(server_name = %config.name, attempt, "Connected to MCP server");
                    return Ok(connection);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        server_name = %config.name,
                        attempts = max_attempts,
                        error = %e,
                        "Giving up on MCP server"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = settings.backoff.delay_after(attempt);
                    warn!(
                        server_name = %config.name,
                        attempt,
                        max_attempts,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Connect attempt failed"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Record a server whose connect attempts are exhausted.
    async fn give_up(
        &self,
        mut state: tokio::sync::MutexGuard<'_, SupervisorState>,
        server_name: &str,
        error: &McpError,
        auto_disable: bool,
    ) {
        // Removed while connecting: nothing left to report on
        if state.config_by_name(server_name).is_none() {
            return;
        }

        let reason = error.to_string();
        state.connections.remove(server_name);
        state.strip_catalog(server_name);

        // Disabled while connecting: the edit decides the final status
        if !state.is_enabled(server_name) {
            state
                .statuses
                .entry(server_name.to_string())
                .or_default()
                .note_error(reason);
            self.set_status(&mut state, server_name, ServerStatus::Disabled);
            return;
        }

        self.set_status(&mut state, server_name, ServerStatus::Error(reason.clone()));

        if !auto_disable {
            return;
        }

        let Some(config) = state
            .configs
            .iter_mut()
            .find(|c| c.name == server_name && c.enabled)
        else {
            return;
        };
        config.enabled = false;
        state.invalidate_caches();

        warn!(server_name = %server_name, reason = %reason, "Auto-disabled MCP server");
        self.set_status(&mut state, server_name, ServerStatus::Disabled);
        self.emit(SupervisorEvent::ServerAutoDisabled {
            server_name: server_name.to_string(),
            reason,
        });

        self.persist(state).await;
    }

    /// A connection that completed its handshake lost its process.
    pub(super) async fn handle_termination(&self, server_name: &str, connection_id: u64, reason: String) {
        let connection = {
            let mut state = self.state().await;
            let current = state
                .connections
                .get(server_name)
                .is_some_and(|c| c.id() == connection_id);
            if !current {
                debug!(server_name = %server_name, connection_id, "Ignoring event from a replaced connection");
                return;
            }

            let connection = state.connections.remove(server_name);
            state.strip_catalog(server_name);

            if state.is_enabled(server_name) {
                state
                    .statuses
                    .entry(server_name.to_string())
                    .or_default()
                    .note_error(reason);
                self.set_status(&mut state, server_name, ServerStatus::Reconnecting);
                self.schedule_reconnect(&mut state, server_name);
            } else {
                self.set_status(&mut state, server_name, ServerStatus::Disabled);
            }
            connection
        };

        // Reaps the process and fails anything still pending
        if let Some(connection) = connection {
            connection.disconnect().await;
        }
    }

    fn schedule_reconnect(&self, state: &mut SupervisorState, server_name: &str) {
        if state.pending_reconnects.contains_key(server_name) {
            return;
        }

        let delay = self.inner.settings.reconnect_delay;
        let supervisor = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();
        let name = server_name.to_string();

        info!(server_name = %server_name, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "Scheduling reconnect");

        let task = tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            if let Some(inner) = supervisor.upgrade() {
                Supervisor { inner }.run_reconnect(&name).await;
            }
        });

        state
            .pending_reconnects
            .insert(server_name.to_string(), task.abort_handle());
    }

    async fn run_reconnect(&self, server_name: &str) {
        let config = {
            let mut state = self.state().await;
            state.pending_reconnects.remove(server_name);

            match state.config_by_name(server_name) {
                Some(config) if config.enabled => config.clone(),
                Some(_) => {
                    self.set_status(&mut state, server_name, ServerStatus::Disabled);
                    return;
                }
                None => return,
            }
        };

        info!(server_name = %server_name, "Reconnecting MCP server");
        if let Err(e) = self.connect_server(config, false).await {
            warn!(server_name = %server_name, error = %e, "Reconnect failed");
        }
    }
}
