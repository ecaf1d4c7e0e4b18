//! Command handlers.
//!
//! Handlers follow one pattern: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`,
//! calling the supervisor and formatting its answers for the terminal. Any
//! command that connects servers shuts the supervisor down before returning.

pub mod call;
pub mod config;
pub mod servers;
pub mod tools;

use mcpvisor_core::McpError;

use crate::bootstrap::CliContext;

/// Connect every enabled server, logging the ones that fail.
pub(crate) async fn connect_enabled(ctx: &CliContext) {
    for (server_name, error) in ctx.supervisor().connect_to_all_enabled_servers().await {
        tracing::warn!(server_name = %server_name, error = %error, "Could not connect");
    }
}

/// Config entry id for a server name.
pub(crate) async fn id_of(ctx: &CliContext, server_name: &str) -> Result<String, McpError> {
    ctx.supervisor()
        .server_configs()
        .await
        .into_iter()
        .find(|c| c.name == server_name)
        .map(|c| c.id)
        .ok_or_else(|| McpError::UnknownServer(server_name.to_string()))
}
