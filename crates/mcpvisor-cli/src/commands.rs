//! Subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Connect every enabled server and show its status
    Servers,

    /// List the tools offered by enabled servers
    Tools {
        /// Print OpenAI-style function definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call a tool by name
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
        /// Call the tool on this server instead of routing by name
        #[arg(long)]
        server: Option<String>,
    },

    /// Add a server definition
    Add {
        /// Unique server name
        name: String,
        /// Executable path or command name (e.g. "npx")
        command: String,
        /// Arguments passed to the executable
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Environment override, repeatable
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
        /// Store the server without enabling it
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a server definition
    Remove {
        /// Server name
        name: String,
    },

    /// Enable a server and connect it
    Enable {
        /// Server name
        name: String,
    },

    /// Disable a server
    Disable {
        /// Server name
        name: String,
    },
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
