use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::connection::ConnectionOptions;

/// Timing and retry policy of a [`Supervisor`](super::Supervisor).
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Connect attempts before a server is given up on.
    pub max_connect_attempts: u32,
    /// Wait between failed connect attempts.
    pub backoff: BackoffPolicy,
    /// Bound on a single tool call.
    pub execution_timeout: Duration,
    /// Wait before reconnecting a server whose process died.
    pub reconnect_delay: Duration,
    /// Bound on the MCP handshake of connections made by the default connector.
    pub handshake_timeout: Duration,
}

impl SupervisorSettings {
    /// Options for the stdio connector built by [`Supervisor::new`](super::Supervisor::new).
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            handshake_timeout: self.handshake_timeout,
            ..ConnectionOptions::default()
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_connect_attempts: 3,
            backoff: BackoffPolicy::default(),
            execution_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}
