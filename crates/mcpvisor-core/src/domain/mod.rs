//! MCP domain types.
//!
//! # Design
//!
//! - `ServerConfig` - identity and launch recipe for one MCP server
//! - `Tool` / `ToolInputSchema` - a tool discovered via `tools/list`
//! - `Resource` - a resource discovered via `resources/list`
//! - `ServerStatus` / `ServerStatusInfo` - observer-facing projection of a server's state

mod catalog;
mod server;
mod status;

pub use catalog::{DescriptorError, Resource, Tool, ToolInputSchema};
pub use server::ServerConfig;
pub use status::{ServerStatus, ServerStatusInfo};
