use std::path::{Path, PathBuf};

use super::providers::{EnvProvider, FsProvider, ShellLookup, SystemEnv, SystemFs, SystemShell};
use super::search::Searcher;
use super::types::{Attempt, AttemptOutcome, Resolution, ResolveError};

#[derive(Debug, Clone, Copy)]
enum Stage {
    Path,
    EtcPaths,
    PlatformDefaults,
    NodeManagers,
    Shell,
}

const STAGES: [Stage; 5] = [
    Stage::Path,
    Stage::EtcPaths,
    Stage::PlatformDefaults,
    Stage::NodeManagers,
    Stage::Shell,
];

/// Resolve `command` to an absolute executable path.
///
/// Order:
/// 1. An absolute path is checked directly; if unusable, its basename is
///    resolved instead (with a warning)
/// 2. `PATH`
/// 3. `/etc/paths` and `/etc/paths.d/*` (macOS)
/// 4. Platform default directories
/// 5. asdf, volta and nvm shims for `node`, `npm` and `npx`
/// 6. `command -v` in `sh`
///
/// Blocking: runs a shell on the last stage.
pub fn resolve_executable(command: &str) -> Result<Resolution, ResolveError> {
    resolve_executable_with_deps(command, &SystemEnv, &SystemFs, &SystemShell)
}

pub fn resolve_executable_with_deps(
    command: &str,
    env: &dyn EnvProvider,
    fs: &dyn FsProvider,
    shell: &dyn ShellLookup,
) -> Result<Resolution, ResolveError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(ResolveError::EmptyCommand);
    }

    let mut attempts = Vec::new();
    let mut warnings = Vec::new();
    let mut name = command;

    let as_path = Path::new(command);
    if as_path.is_absolute() {
        let outcome = fs.check_executable(as_path);
        let usable = outcome == AttemptOutcome::Ok;
        attempts.push(Attempt::new(as_path.to_path_buf(), outcome.clone()));
        if usable {
            return Ok(Resolution {
                path: as_path.to_path_buf(),
                attempts,
                warnings,
            });
        }

        match as_path.file_name().and_then(|n| n.to_str()) {
            Some(basename) => {
                warnings.push(format!(
                    "'{command}' is unusable ({outcome}), searching for '{basename}' instead"
                ));
                name = basename;
            }
            None => return Err(ResolveError::not_resolved(command, &attempts)),
        }
    }

    let searcher = Searcher::new(env, fs);
    for stage in STAGES {
        let stage_attempts = match stage {
            Stage::Path => searcher.probe_dirs(name, searcher.path_dirs()),
            Stage::EtcPaths => searcher.probe_dirs(name, searcher.etc_paths_dirs()),
            Stage::PlatformDefaults => searcher.probe_dirs(name, Searcher::platform_dirs()),
            Stage::NodeManagers => searcher.probe(searcher.node_manager_candidates(name)),
            Stage::Shell => shell_attempt(name, fs, shell),
        };

        let found = stage_attempts
            .iter()
            .find(|a| a.succeeded())
            .map(|a| a.candidate.clone());
        attempts.extend(stage_attempts);

        if let Some(path) = found {
            return Ok(Resolution {
                path,
                attempts,
                warnings,
            });
        }
    }

    Err(ResolveError::not_resolved(command, &attempts))
}

fn shell_attempt(command: &str, fs: &dyn FsProvider, shell: &dyn ShellLookup) -> Vec<Attempt> {
    let attempt = match shell.command_v(command) {
        Some(path) => {
            let outcome = fs.check_executable(&path);
            Attempt::new(path, outcome)
        }
        None => Attempt::new(
            PathBuf::from(format!("sh: command -v {command}")),
            AttemptOutcome::NotFound,
        ),
    };
    vec![attempt]
}
