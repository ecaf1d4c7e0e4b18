//! Tool and resource discovery.

use std::sync::Arc;

use futures_util::future::join_all;
use mcpvisor_core::{Resource, ServerStatus, SupervisorEvent, Tool};
use tracing::{debug, info, warn};

use super::Supervisor;
use super::state::SupervisorState;
use crate::connection::Connection;

struct Discovered {
    server_name: String,
    connection_id: u64,
    tools: Vec<Tool>,
    resources: Vec<Resource>,
}

impl Supervisor {
    /// Re-discover one server's tools and resources, replacing what was
    /// known. Does nothing if the server is not connected.
    pub async fn discover_tools(&self, server_name: &str) {
        let connection = self.state().await.connections.get(server_name).cloned();

        match connection {
            Some(connection) if connection.is_connected() => {
                self.discover_on(&connection).await;
            }
            _ => debug!(server_name = %server_name, "Not connected; skipping discovery"),
        }
    }

    /// Re-discover every connected server concurrently, then apply all
    /// results at once.
    pub async fn discover_all_tools(&self) {
        let connections: Vec<Arc<Connection>> = self
            .state()
            .await
            .connections
            .values()
            .filter(|c| c.is_connected())
            .cloned()
            .collect();

        let discovered = join_all(connections.iter().map(|c| fetch_catalog(c))).await;

        let mut state = self.state().await;
        for result in discovered {
            self.apply_catalog(&mut state, result);
        }
    }

    pub(super) async fn discover_on(&self, connection: &Connection) {
        let discovered = fetch_catalog(connection).await;

        let mut state = self.state().await;
        self.apply_catalog(&mut state, discovered);
    }

    fn apply_catalog(&self, state: &mut SupervisorState, discovered: Discovered) {
        let Discovered {
            server_name,
            connection_id,
            tools,
            resources,
        } = discovered;

        let current = state
            .connections
            .get(&server_name)
            .is_some_and(|c| c.id() == connection_id);
        if !current {
            debug!(server_name = %server_name, "Discarding discovery from a replaced connection");
            return;
        }

        let tool_count = tools.len();
        let resource_count = resources.len();
        for name in state.replace_catalog(&server_name, tools, resources) {
            warn!(
                server_name = %server_name,
                tool = %name,
                "Tool name already offered by another server; calls by name now go to this one"
            );
        }

        info!(server_name = %server_name, tool_count, resource_count, "Discovered MCP tools");
        self.emit(SupervisorEvent::CatalogUpdated {
            server_name: server_name.clone(),
            tool_count,
            resource_count,
        });
        self.set_status(state, &server_name, ServerStatus::Connected);
    }
}

/// `tools/list` and `resources/list` side by side; either may fail alone.
async fn fetch_catalog(connection: &Connection) -> Discovered {
    let server_name = connection.server_name();
    let (tools, resources) = tokio::join!(connection.list_tools(), connection.list_resources());

    let tools = tools.unwrap_or_else(|e| {
        warn!(server_name = %server_name, error = %e, "Tool discovery failed");
        Vec::new()
    });
    // Plenty of servers do not implement resources at all
    let resources = resources.unwrap_or_else(|e| {
        debug!(server_name = %server_name, error = %e, "Resource discovery failed");
        Vec::new()
    });

    Discovered {
        server_name: server_name.to_string(),
        connection_id: connection.id(),
        tools,
        resources,
    }
}
