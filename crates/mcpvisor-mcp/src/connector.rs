//! How the supervisor obtains live connections.

use std::sync::Arc;

use async_trait::async_trait;
use mcpvisor_core::{McpError, ServerConfig};

use crate::connection::{Connection, ConnectionEventSender, ConnectionOptions};

/// Produces a connected, handshaken [`Connection`] for a server definition.
///
/// The supervisor calls this once per connect attempt. A failed attempt
/// must leave nothing running.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        config: &ServerConfig,
        events: ConnectionEventSender,
    ) -> Result<Arc<Connection>, McpError>;
}

/// Spawns the configured command and speaks MCP over its stdio.
#[derive(Debug, Clone, Default)]
pub struct StdioConnector {
    options: ConnectionOptions,
}

impl StdioConnector {
    pub const fn new(options: ConnectionOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &ConnectionOptions {
        &self.options
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
        events: ConnectionEventSender,
    ) -> Result<Arc<Connection>, McpError> {
        let connection = Connection::new(config.clone(), self.options.clone(), Some(events));
        connection.connect().await?;
        Ok(Arc::new(connection))
    }
}
