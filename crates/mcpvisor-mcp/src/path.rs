//! Environment for MCP server child processes.
//!
//! GUI launchers and service managers often start us with a minimal `PATH`,
//! which breaks servers that are scripts (`#!/usr/bin/env node`) or shell
//! out to other tools. The child gets a `PATH` that starts with the
//! executable's own directory and the conventional install locations.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Install locations tried ahead of the inherited `PATH`.
const COMMON_BIN_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin"];
/// Home-relative install locations.
const HOME_BIN_DIRS: &[&str] = &[".cargo/bin", ".local/bin"];
/// System locations, after the user-level ones.
const SYSTEM_BIN_DIRS: &[&str] = &["/usr/bin", "/bin"];

/// Build the effective `PATH` for a child.
///
/// Order: executable directory, common install dirs, the inherited `PATH`.
/// Duplicates keep their first position.
pub fn build_effective_path(exe_path: &Path, inherited: Option<OsString>, home: Option<PathBuf>) -> OsString {
    let mut entries: Vec<PathBuf> = Vec::new();

    if let Some(dir) = exe_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        entries.push(dir.to_path_buf());
    }

    entries.extend(COMMON_BIN_DIRS.iter().map(PathBuf::from));
    if let Some(home) = home {
        entries.extend(HOME_BIN_DIRS.iter().map(|rel| home.join(rel)));
    }
    entries.extend(SYSTEM_BIN_DIRS.iter().map(PathBuf::from));

    if let Some(inherited) = inherited {
        entries.extend(env::split_paths(&inherited).filter(|p| !p.as_os_str().is_empty()));
    }

    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.clone()));

    // Only an entry containing the separator itself can fail to join.
    entries.retain(|entry| env::join_paths([entry]).is_ok());
    env::join_paths(&entries).unwrap_or_default()
}

/// Environment variables to set on the child, on top of what it inherits.
///
/// The rebuilt `PATH` comes first and the server's own `env` map last, so an
/// explicit `PATH` in the config replaces the computed one.
pub fn child_environment(exe_path: &Path, overrides: &BTreeMap<String, String>) -> Vec<(OsString, OsString)> {
    let path = build_effective_path(exe_path, env::var_os("PATH"), dirs::home_dir());

    let mut vars = vec![(OsString::from("PATH"), path)];
    vars.extend(
        overrides
            .iter()
            .map(|(key, value)| (OsString::from(key), OsString::from(value))),
    );
    vars
}
