//! Event emitter trait for supervisor observers.
//!
//! Implementations handle transport details (channels, UI bridges, logs).

use crate::events::SupervisorEvent;

/// Trait for emitting supervisor events.
///
/// Called while the supervisor's state is being updated, so implementations
/// must not block; buffer or forward to a channel instead.
pub trait SupervisorEventEmitter: Send + Sync {
    fn emit(&self, event: SupervisorEvent);
}

/// A no-op event emitter for tests and headless contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl SupervisorEventEmitter for NoopEmitter {
    fn emit(&self, _event: SupervisorEvent) {}
}
