//! Root CLI structure and global options.

use std::path::PathBuf;

use clap::Parser;
use mcpvisor_core::CONFIG_ENV_VAR;

use crate::commands::Commands;

/// Launch, inspect and call MCP servers.
#[derive(Parser)]
#[command(name = "mcpvisor")]
#[command(about = "Supervise MCP servers and call their tools")]
#[command(version)]
pub struct Cli {
    /// Server definition file (defaults to the platform config directory)
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
