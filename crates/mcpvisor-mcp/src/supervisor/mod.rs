//! Supervision of many MCP servers.
//!
//! A [`Supervisor`] owns one [`Connection`] per connected server and is the
//! only entry point other subsystems use:
//!
//! - lifecycle: connect with retry and backoff, auto-disable after repeated
//!   failures, scheduled reconnect after a crash
//! - configuration: add, update (with restart when launch parameters change),
//!   remove, all persisted through a [`ServerConfigStore`]
//! - catalog: discovered tools and resources per server, plus the cached view
//!   of tools belonging to enabled servers
//! - execution: `execute_tool` routes by tool name under a deadline
//!
//! All catalog, status and connection bookkeeping sits behind a single async
//! mutex. It is never held across a connect, discovery or tool call, only
//! across the read-recompute-write step that follows one.

mod catalog;
mod configs;
mod lifecycle;
mod settings;
mod state;

pub use settings::SupervisorSettings;

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use mcpvisor_core::{
    McpError, Resource, ServerConfig, ServerConfigStore, ServerStatus, ServerStatusInfo,
    SupervisorEvent, SupervisorEventEmitter, Tool,
};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionEvent, ConnectionEventSender};
use crate::connector::{Connector, StdioConnector};
use crate::deadline::run_with_deadline;
use state::SupervisorState;

/// Handle to the supervisor. Cheap to clone; clones share all state.
///
/// Must be created inside a tokio runtime: construction spawns the task that
/// consumes connection events.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<SupervisorState>,
    /// Server names with a connect sequence running.
    in_flight: StdMutex<HashSet<String>>,
    /// Serializes writes to the store in snapshot order.
    persist_lock: Mutex<()>,
    store: Arc<dyn ServerConfigStore>,
    emitter: Arc<dyn SupervisorEventEmitter>,
    connector: Arc<dyn Connector>,
    settings: SupervisorSettings,
    events_tx: ConnectionEventSender,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Supervisor {
    /// Supervisor with default settings that launches servers over stdio.
    pub fn new(
        configs: Vec<ServerConfig>,
        store: Arc<dyn ServerConfigStore>,
        emitter: Arc<dyn SupervisorEventEmitter>,
    ) -> Self {
        let settings = SupervisorSettings::default();
        let connector = Arc::new(StdioConnector::new(settings.connection_options()));
        Self::with_options(configs, store, emitter, settings, connector)
    }

    pub fn with_options(
        configs: Vec<ServerConfig>,
        store: Arc<dyn ServerConfigStore>,
        emitter: Arc<dyn SupervisorEventEmitter>,
        settings: SupervisorSettings,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let mut seen = HashSet::new();
        let configs: Vec<ServerConfig> = configs
            .into_iter()
            .filter(|config| {
                let unique = seen.insert(config.name.clone());
                if !unique {
                    warn!(server_name = %config.name, "Ignoring duplicate server definition");
                }
                unique
            })
            .collect();

        let mut state = SupervisorState::new(configs);
        for config in &state.configs {
            let status = if config.enabled {
                ServerStatus::Idle
            } else {
                ServerStatus::Disabled
            };
            state
                .statuses
                .insert(config.name.clone(), ServerStatusInfo::new(status));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            in_flight: StdMutex::new(HashSet::new()),
            persist_lock: Mutex::new(()),
            store,
            emitter,
            connector,
            settings,
            events_tx,
            shutdown: shutdown.clone(),
        });

        tokio::spawn(dispatch_events(Arc::downgrade(&inner), events_rx, shutdown));

        Self { inner }
    }

    /// Supervisor over the definitions currently in `store`.
    pub async fn load(
        store: Arc<dyn ServerConfigStore>,
        emitter: Arc<dyn SupervisorEventEmitter>,
    ) -> Result<Self, McpError> {
        let configs = store.load().await?;
        Ok(Self::new(configs, store, emitter))
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }

    pub async fn server_configs(&self) -> Vec<ServerConfig> {
        self.state().await.configs.clone()
    }

    /// Tools of enabled servers, in registration order.
    pub async fn get_enabled_tools(&self) -> Vec<Tool> {
        self.state().await.enabled_cache().tools.clone()
    }

    /// Enabled tools as OpenAI-style function definitions.
    pub async fn get_enabled_tools_as_function_schema(&self) -> Vec<Value> {
        self.state().await.enabled_cache().function_schemas.clone()
    }

    pub async fn get_tools_by_server(&self, server_name: &str) -> Vec<Tool> {
        self.state()
            .await
            .tools
            .iter()
            .filter(|t| t.server_name == server_name)
            .cloned()
            .collect()
    }

    pub async fn get_resources(&self) -> Vec<Resource> {
        self.state().await.resources.clone()
    }

    pub async fn get_resources_by_server(&self, server_name: &str) -> Vec<Resource> {
        self.state()
            .await
            .resources
            .iter()
            .filter(|r| r.server_name == server_name)
            .cloned()
            .collect()
    }

    /// Status of one server. Unknown servers report `disabled`.
    pub async fn get_server_status(&self, server_name: &str) -> ServerStatusInfo {
        let state = self.state().await;
        state.statuses.get(server_name).cloned().unwrap_or_else(|| {
            let status = if state.is_enabled(server_name) {
                ServerStatus::Idle
            } else {
                ServerStatus::Disabled
            };
            ServerStatusInfo::new(status)
        })
    }

    /// Status of every configured server, in configuration order.
    pub async fn get_all_statuses(&self) -> Vec<(String, ServerStatusInfo)> {
        let state = self.state().await;
        state
            .configs
            .iter()
            .map(|config| {
                let status = state.statuses.get(&config.name).cloned().unwrap_or_default();
                (config.name.clone(), status)
            })
            .collect()
    }

    pub async fn is_server_connected(&self, server_name: &str) -> bool {
        self.state()
            .await
            .connections
            .get(server_name)
            .is_some_and(|c| c.is_connected())
    }

    pub async fn get_connected_server_count(&self) -> usize {
        self.state()
            .await
            .connections
            .values()
            .filter(|c| c.is_connected())
            .count()
    }

    /// Call a tool by name on whichever enabled server registered it last.
    ///
    /// Fails with [`McpError::ToolNotFound`] when no enabled server offers the
    /// tool or its server is not connected, [`McpError::ExecutionTimedOut`]
    /// after the execution timeout, and [`McpError::ExecutionFailed`] for
    /// anything else. A tool that reports `isError` is not a failure; its
    /// text comes back prefixed with `Error: `.
    pub async fn execute_tool(&self, tool_name: &str, arguments: Value) -> Result<String, McpError> {
        let connection = {
            let mut state = self.state().await;
            let owner = state
                .owner_of(tool_name)
                .ok_or_else(|| McpError::ToolNotFound(tool_name.to_string()))?;
            live_connection(&state, &owner)
                .ok_or_else(|| McpError::ToolNotFound(tool_name.to_string()))?
        };

        self.call_with_deadline(&connection, tool_name, arguments).await
    }

    /// Call `tool_name` on a specific server, bypassing the flat namespace.
    pub async fn execute_server_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<String, McpError> {
        let connection = {
            let state = self.state().await;
            let offered = state.is_enabled(server_name)
                && state
                    .tools
                    .iter()
                    .any(|t| t.server_name == server_name && t.name == tool_name);
            if !offered {
                return Err(McpError::ToolNotFound(format!("{server_name}/{tool_name}")));
            }
            live_connection(&state, server_name)
                .ok_or_else(|| McpError::ToolNotFound(format!("{server_name}/{tool_name}")))?
        };

        self.call_with_deadline(&connection, tool_name, arguments).await
    }

    async fn call_with_deadline(
        &self,
        connection: &Connection,
        tool_name: &str,
        arguments: Value,
    ) -> Result<String, McpError> {
        let timeout = self.inner.settings.execution_timeout;
        debug!(server_name = %connection.server_name(), tool = %tool_name, "Executing tool");

        match run_with_deadline(timeout, connection.call_tool(tool_name, arguments)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                warn!(
                    server_name = %connection.server_name(),
                    tool = %tool_name,
                    error = %e,
                    "Tool execution failed"
                );
                Err(McpError::ExecutionFailed {
                    tool: tool_name.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    server_name = %connection.server_name(),
                    tool = %tool_name,
                    timeout_secs = timeout.as_secs_f64(),
                    "Tool execution timed out"
                );
                Err(McpError::ExecutionTimedOut)
            }
        }
    }

    async fn state(&self) -> MutexGuard<'_, SupervisorState> {
        self.inner.state.lock().await
    }

    fn emit(&self, event: SupervisorEvent) {
        self.inner.emitter.emit(event);
    }

    /// Move `server_name` to `status`, refresh its tool count and notify.
    fn set_status(&self, state: &mut SupervisorState, server_name: &str, status: ServerStatus) {
        let tool_count = state.tool_count(server_name);
        let info = state.statuses.entry(server_name.to_string()).or_default();
        info.transition(status);
        info.set_tool_count(tool_count);
        let snapshot = info.clone();

        self.emit(SupervisorEvent::StatusChanged {
            server_name: server_name.to_string(),
            status: snapshot,
        });
    }

    /// Refresh the tool count and error note without changing the state.
    fn refresh_status(&self, state: &mut SupervisorState, server_name: &str, error: Option<String>) {
        let tool_count = state.tool_count(server_name);
        let info = state.statuses.entry(server_name.to_string()).or_default();
        info.set_tool_count(tool_count);
        if let Some(error) = error {
            info.note_error(error);
        }
        let snapshot = info.clone();

        self.emit(SupervisorEvent::StatusChanged {
            server_name: server_name.to_string(),
            status: snapshot,
        });
    }

    /// Write the current configuration list to the store.
    ///
    /// The persist lock is taken before the state lock is released so that
    /// writes reach the store in the order the snapshots were taken. A failed
    /// write is logged; the in-memory change stands.
    async fn persist(&self, state: MutexGuard<'_, SupervisorState>) {
        let _order = self.inner.persist_lock.lock().await;
        let snapshot = state.configs.clone();
        drop(state);

        if let Err(e) = self.inner.store.save(&snapshot).await {
            warn!(error = %e, "Failed to persist server configuration");
        }
    }

    /// Claim the connect slot for `server_name`, or `None` if one is running.
    fn claim_in_flight(&self, server_name: &str) -> Option<InFlight<'_>> {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.insert(server_name.to_string()).then(|| InFlight {
            set: &self.inner.in_flight,
            name: server_name.to_string(),
        })
    }

    async fn handle_connection_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Terminated {
                server_name,
                connection_id,
                reason,
            } => self.handle_termination(&server_name, connection_id, reason).await,
            ConnectionEvent::StderrError {
                server_name,
                connection_id,
                line,
            } => {
                let mut state = self.state().await;
                let current = state
                    .connections
                    .get(&server_name)
                    .is_some_and(|c| c.id() == connection_id);
                if current {
                    self.refresh_status(&mut state, &server_name, Some(line));
                }
            }
        }
    }
}

/// Releases a server's connect slot when the connect sequence ends.
struct InFlight<'a> {
    set: &'a StdMutex<HashSet<String>>,
    name: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

fn live_connection(state: &SupervisorState, server_name: &str) -> Option<Arc<Connection>> {
    state
        .connections
        .get(server_name)
        .filter(|c| c.is_connected())
        .cloned()
}

/// Applies connection events to supervisor state, one at a time.
async fn dispatch_events(
    inner: Weak<Inner>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };
        Supervisor { inner }.handle_connection_event(event).await;
    }

    debug!("Supervisor event loop stopped");
}
