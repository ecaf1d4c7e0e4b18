//! MCP connections over stdio and the supervisor that keeps them alive.
//!
//! - [`Connection`] owns one server subprocess and correlates newline-delimited
//!   JSON-RPC requests and responses over its pipes.
//! - [`Supervisor`] owns every connection, drives connect/retry/reconnect and
//!   auto-disable, aggregates discovered tools and resources, and executes
//!   tools by name under a deadline.
//!
//! Reference: <https://spec.modelcontextprotocol.io/>
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod backoff;
pub mod connection;
pub mod connector;
pub mod content;
pub mod deadline;
pub(crate) mod discovery;
pub(crate) mod framing;
pub(crate) mod path;
pub mod protocol;
pub mod resolver;
pub(crate) mod shutdown;
pub mod supervisor;

// Re-export domain types from core for convenience
pub use mcpvisor_core::{
    ConfigStoreError, InMemoryConfigStore, McpError, NoopEmitter, Resource, ServerConfig,
    ServerConfigStore, ServerStatus, ServerStatusInfo, SupervisorEvent, SupervisorEventEmitter,
    Tool, ToolInputSchema,
};

// Re-export this crate's public types
pub use backoff::BackoffPolicy;
pub use connection::{
    Connection, ConnectionEvent, ConnectionEventSender, ConnectionOptions, ConnectionState,
};
pub use connector::{Connector, StdioConnector};
pub use deadline::{DeadlineExceeded, run_with_deadline};
pub use supervisor::{Supervisor, SupervisorSettings};

// Used only by integration tests
#[cfg(test)]
use mockall as _;
