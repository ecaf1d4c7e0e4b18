//! Command-line front end for the mcpvisor supervisor.
//!
//! `main` parses arguments, [`bootstrap`] wires the JSON file store and the
//! supervisor together, and each command is a thin handler over the
//! [`Supervisor`](mcpvisor_mcp::Supervisor) API.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Installed by the binary only
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod config_store;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliConfig, CliContext, LogEmitter, bootstrap};
pub use commands::Commands;
pub use config_store::JsonFileConfigStore;
pub use parser::Cli;
