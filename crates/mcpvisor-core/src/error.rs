//! Error taxonomy shared by the connection, the supervisor and their callers.

use thiserror::Error;

use crate::ports::ConfigStoreError;

/// Errors surfaced by MCP connections and the supervisor.
///
/// Transport-level failures (`ExecutableNotFound`, `Transport`,
/// `InitializationFailed`) abort a connect attempt. Tool-level failures
/// (`ExecutionTimedOut`, `ExecutionFailed`, `ToolNotFound`) are returned to the
/// immediate caller and never affect a connection's liveness.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Server not connected")]
    NotConnected,

    #[error("Failed to encode JSON-RPC message: {0}")]
    EncodingFailed(String),

    #[error("MCP initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Invalid response from MCP server: {0}")]
    InvalidResponse(String),

    #[error("Tool execution timed out")]
    ExecutionTimedOut,

    #[error("Tool '{tool}' failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A JSON-RPC error object returned for a request.
    #[error("MCP server returned error: code={code}, message={message}")]
    Rpc { code: i64, message: String },

    /// Spawning the process or writing to its pipes failed.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("MCP server already exists: {0}")]
    DuplicateServer(String),

    #[error("Unknown MCP server: {0}")]
    UnknownServer(String),

    #[error("Invalid MCP configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    ConfigStore(#[from] ConfigStoreError),
}

impl McpError {
    /// Whether retrying the same connect attempt could plausibly succeed.
    pub const fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound(_)
                | Self::NotConnected
                | Self::InitializationFailed(_)
                | Self::Transport(_)
        )
    }
}
