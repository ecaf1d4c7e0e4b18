//! MCP server definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const fn default_enabled() -> bool {
    true
}

/// Identity and launch recipe for one MCP server.
///
/// `name` is unique among the configs a supervisor holds and doubles as the
/// routing key for tool execution. A config is never patched under a live
/// connection: any change to `name`, `command`, `args` or `env` while the
/// server is enabled restarts the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Stable identifier (UUID v4 when created through [`ServerConfig::new`]).
    pub id: String,

    /// User-facing name, unique across configs.
    pub name: String,

    /// Executable path or bare command name (e.g. "npx").
    pub command: String,

    /// Argument vector passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides merged over the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Whether this server should be connected and its tools offered.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ServerConfig {
    /// Create an enabled server definition with a fresh id.
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            command: command.into(),
            args,
            env: BTreeMap::new(),
            enabled: true,
        }
    }

    /// Add an environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set enabled status.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether `other` would launch a different process than `self`.
    ///
    /// The enabled flag is deliberately not part of the comparison.
    pub fn launch_differs(&self, other: &Self) -> bool {
        self.name != other.name
            || self.command != other.command
            || self.args != other.args
            || self.env != other.env
    }

    /// Validate the definition before it is accepted.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Server name cannot be empty".to_string());
        }

        if self.command.is_empty() {
            return Err(format!("Server '{}' has an empty command", self.name));
        }

        // Flags belong in args; a command with spaces is almost always a pasted shell line
        if !std::path::Path::new(&self.command).is_absolute()
            && self.command.contains(char::is_whitespace)
        {
            return Err(format!(
                "Command must be an executable name/path only (e.g., 'npx'). \
                 Put flags and arguments in 'args' (server '{}')",
                self.name
            ));
        }

        Ok(())
    }
}
