//! Everything the supervisor mutates, behind one lock.

use std::collections::HashMap;
use std::sync::Arc;

use mcpvisor_core::{Resource, ServerConfig, ServerStatusInfo, Tool};
use serde_json::Value;
use tokio::task::AbortHandle;

use crate::connection::Connection;

/// Tools of enabled servers plus the flat name lookup.
///
/// Built in full on first read after an invalidation, never patched.
#[derive(Debug, Default)]
pub struct EnabledToolsCache {
    pub tools: Vec<Tool>,
    /// Tool name to owning server. Later catalog entries win.
    pub owners: HashMap<String, String>,
    pub function_schemas: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct SupervisorState {
    pub configs: Vec<ServerConfig>,
    pub connections: HashMap<String, Arc<Connection>>,
    /// Aggregate catalog in registration order.
    pub tools: Vec<Tool>,
    pub resources: Vec<Resource>,
    pub statuses: HashMap<String, ServerStatusInfo>,
    /// At most one scheduled reconnect per server name.
    pub pending_reconnects: HashMap<String, AbortHandle>,
    enabled_cache: Option<EnabledToolsCache>,
}

impl SupervisorState {
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        Self {
            configs,
            ..Self::default()
        }
    }

    pub fn config_by_name(&self, name: &str) -> Option<&ServerConfig> {
        self.configs.iter().find(|c| c.name == name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.config_by_name(name).is_some_and(|c| c.enabled)
    }

    pub fn tool_count(&self, server_name: &str) -> usize {
        self.tools
            .iter()
            .filter(|t| t.server_name == server_name)
            .count()
    }

    /// Replace everything known about `server_name` with a fresh discovery.
    ///
    /// Returns names of new tools that shadow a tool of another server.
    pub fn replace_catalog(
        &mut self,
        server_name: &str,
        tools: Vec<Tool>,
        resources: Vec<Resource>,
    ) -> Vec<String> {
        self.strip_catalog(server_name);

        let collisions = tools
            .iter()
            .filter(|new| self.tools.iter().any(|old| old.name == new.name))
            .map(|t| t.name.clone())
            .collect();

        self.tools.extend(tools);
        self.resources.extend(resources);
        self.invalidate_caches();

        collisions
    }

    /// Forget every tool and resource of `server_name`.
    pub fn strip_catalog(&mut self, server_name: &str) {
        self.tools.retain(|t| t.server_name != server_name);
        self.resources.retain(|r| r.server_name != server_name);
        self.invalidate_caches();
    }

    pub fn invalidate_caches(&mut self) {
        self.enabled_cache = None;
    }

    pub fn enabled_cache(&mut self) -> &EnabledToolsCache {
        if self.enabled_cache.is_none() {
            let tools: Vec<Tool> = self
                .tools
                .iter()
                .filter(|t| self.is_enabled(&t.server_name))
                .cloned()
                .collect();
            let owners = tools
                .iter()
                .map(|t| (t.name.clone(), t.server_name.clone()))
                .collect();
            let function_schemas = tools.iter().map(Tool::to_function_schema).collect();

            self.enabled_cache = Some(EnabledToolsCache {
                tools,
                owners,
                function_schemas,
            });
        }

        self.enabled_cache.get_or_insert_with(EnabledToolsCache::default)
    }

    /// Server that answers calls to `tool_name` in the flat namespace.
    pub fn owner_of(&mut self, tool_name: &str) -> Option<String> {
        if let Some(owner) = self.enabled_cache().owners.get(tool_name) {
            return Some(owner.clone());
        }

        self.tools
            .iter()
            .rev()
            .find(|t| t.name == tool_name && self.is_enabled(&t.server_name))
            .map(|t| t.server_name.clone())
    }

    /// Detach a server's live state: pending reconnect, connection, catalog.
    pub fn take_connection(&mut self, server_name: &str) -> Option<Arc<Connection>> {
        if let Some(reconnect) = self.pending_reconnects.remove(server_name) {
            reconnect.abort();
        }
        self.strip_catalog(server_name);
        self.connections.remove(server_name)
    }
}
