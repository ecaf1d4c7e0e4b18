//! Location of the server definition file.
//!
//! Resolution order:
//! 1. `MCPVISOR_CONFIG` environment variable (highest priority)
//! 2. `<platform config dir>/mcpvisor/servers.json`

use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "MCPVISOR_CONFIG";

const APP_DIR: &str = "mcpvisor";
const CONFIG_FILE: &str = "servers.json";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot determine system config directory")]
    NoConfigDir,
}

/// Default path of the server definition file.
pub fn default_config_path() -> Result<PathBuf, PathError> {
    config_path_from(std::env::var_os(CONFIG_ENV_VAR), dirs::config_dir())
}

fn config_path_from(
    override_path: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, PathError> {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    config_dir
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .ok_or(PathError::NoConfigDir)
}
