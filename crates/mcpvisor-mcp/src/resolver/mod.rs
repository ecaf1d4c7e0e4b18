//! Turning a server's `command` into an absolute executable path.
//!
//! Servers are usually configured as `npx`, `uvx` or `node`, and the process
//! we run in may not share the user's login shell `PATH`. Resolution tries a
//! fixed sequence of locations and records every candidate it checked so a
//! failure can explain itself.
//!
//! - `types`: [`Resolution`], [`Attempt`], [`AttemptOutcome`], [`ResolveError`]
//! - `providers`: environment, filesystem and shell seams (mocked in tests)
//! - `search`: candidate locations for each stage
//! - `resolve`: the stage sequence

mod providers;
mod resolve;
mod search;
mod types;

pub use providers::{EnvProvider, FsProvider, ShellLookup, SystemEnv, SystemFs, SystemShell};
pub use resolve::{resolve_executable, resolve_executable_with_deps};
pub use types::{Attempt, AttemptOutcome, Resolution, ResolveError};

#[cfg(test)]
pub use providers::{MockEnv, MockFs, MockShell};
