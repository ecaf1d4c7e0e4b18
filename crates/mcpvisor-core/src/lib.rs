//! Core domain types and ports for mcpvisor.
//!
//! This crate holds everything the MCP supervisor and its collaborators agree
//! on without depending on process management or transport code:
//!
//! - [`domain`] - server definitions, discovered tools/resources, status
//! - [`error`] - the shared [`McpError`] taxonomy
//! - [`ports`] - config persistence and event emission seams
//! - [`events`] - the [`SupervisorEvent`] union emitted to observers
//! - [`paths`] - default location of the server definition file
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod paths;
pub mod ports;

pub use domain::{
    DescriptorError, Resource, ServerConfig, ServerStatus, ServerStatusInfo, Tool,
    ToolInputSchema,
};
pub use error::McpError;
pub use events::SupervisorEvent;
pub use paths::{CONFIG_ENV_VAR, PathError, default_config_path};
pub use ports::{
    ConfigStoreError, InMemoryConfigStore, NoopEmitter, ServerConfigStore,
    SupervisorEventEmitter,
};
