//! Events emitted by the supervisor to observers.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "catalog_updated", "serverName": "fs", "toolCount": 4, "resourceCount": 0 }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::ServerStatusInfo;

/// Everything an observer (settings UI, log sink, chat layer) may react to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SupervisorEvent {
    /// A server's status projection changed.
    StatusChanged {
        server_name: String,
        status: ServerStatusInfo,
    },

    /// Discovery replaced a server's tools/resources.
    CatalogUpdated {
        server_name: String,
        tool_count: usize,
        resource_count: usize,
    },

    /// A server exhausted its connect attempts and was disabled in configuration.
    ServerAutoDisabled { server_name: String, reason: String },

    /// A server definition was removed.
    ServerRemoved { server_name: String },
}

impl SupervisorEvent {
    /// Name of the server the event concerns.
    pub fn server_name(&self) -> &str {
        match self {
            Self::StatusChanged { server_name, .. }
            | Self::CatalogUpdated { server_name, .. }
            | Self::ServerAutoDisabled { server_name, .. }
            | Self::ServerRemoved { server_name } => server_name,
        }
    }
}
