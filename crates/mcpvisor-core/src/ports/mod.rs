//! Port definitions (trait abstractions) for mcpvisor collaborators.
//!
//! The supervisor consumes server definitions and emits status/catalog data;
//! persisting definitions and rendering events belong to whoever composes the
//! application. These traits are the only coupling points.

mod config_store;
mod event_emitter;

pub use config_store::{ConfigStoreError, InMemoryConfigStore, ServerConfigStore};
pub use event_emitter::{NoopEmitter, SupervisorEventEmitter};
