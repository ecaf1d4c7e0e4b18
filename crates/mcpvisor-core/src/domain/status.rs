//! Observer-facing server status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime status of an MCP server.
///
/// This is a projection for observers; it is never consulted to decide
/// whether a connection exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Disabled in configuration (or auto-disabled after repeated failures)
    Disabled,
    /// Enabled but not connected
    #[default]
    Idle,
    /// Connect attempt in flight
    Connecting,
    /// Handshake completed
    Connected,
    /// Connection dropped; a reconnect is scheduled
    Reconnecting,
    /// Last connect attempt failed
    Error(String),
}

impl ServerStatus {
    /// Short label for display.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {message}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Status snapshot for one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatusInfo {
    pub status: ServerStatus,

    /// Most recent human-readable failure, kept across state changes until
    /// the next successful connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    pub tool_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl ServerStatusInfo {
    pub fn new(status: ServerStatus) -> Self {
        let mut info = Self {
            status: ServerStatus::Idle,
            last_error: None,
            tool_count: 0,
            updated_at: Utc::now(),
        };
        info.transition(status);
        info
    }

    /// Move to `status`, maintaining `last_error` and the timestamp.
    pub fn transition(&mut self, status: ServerStatus) {
        match &status {
            ServerStatus::Error(message) => self.last_error = Some(message.clone()),
            ServerStatus::Connected => self.last_error = None,
            _ => {}
        }
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Record a soft failure without changing the state.
    pub fn note_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn set_tool_count(&mut self, tool_count: usize) {
        self.tool_count = tool_count;
        self.updated_at = Utc::now();
    }
}

impl Default for ServerStatusInfo {
    fn default() -> Self {
        Self::new(ServerStatus::Idle)
    }
}
