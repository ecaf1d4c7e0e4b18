//! Candidate locations for each resolution stage.

use std::path::{Path, PathBuf};

use super::providers::{EnvProvider, FsProvider};
use super::types::{Attempt, AttemptOutcome};

/// Commands that version managers shim.
const NODE_COMMANDS: &[&str] = &["node", "npm", "npx"];

#[cfg(target_os = "macos")]
const PLATFORM_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin"];
#[cfg(windows)]
const PLATFORM_DIRS: &[&str] = &[];
#[cfg(not(any(target_os = "macos", windows)))]
const PLATFORM_DIRS: &[&str] = &["/usr/local/bin", "/usr/bin", "/bin"];

pub struct Searcher<'a> {
    env: &'a dyn EnvProvider,
    fs: &'a dyn FsProvider,
}

impl<'a> Searcher<'a> {
    pub fn new(env: &'a dyn EnvProvider, fs: &'a dyn FsProvider) -> Self {
        Self { env, fs }
    }

    /// Check `command` in each directory, stopping at the first executable.
    pub fn probe_dirs<I>(&self, command: &str, dirs: I) -> Vec<Attempt>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.probe(dirs.into_iter().flat_map(|dir| {
            self.file_names(command)
                .into_iter()
                .map(move |name| dir.join(name))
        }))
    }

    /// Check each full candidate path, stopping at the first executable.
    pub fn probe<I>(&self, candidates: I) -> Vec<Attempt>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut attempts = Vec::new();
        for candidate in candidates {
            let outcome = self.fs.check_executable(&candidate);
            let found = outcome == AttemptOutcome::Ok;
            attempts.push(Attempt::new(candidate, outcome));
            if found {
                break;
            }
        }
        attempts
    }

    pub fn path_dirs(&self) -> Vec<PathBuf> {
        self.env
            .get("PATH")
            .map(|path| {
                std::env::split_paths(&path)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Directories listed in `/etc/paths` and `/etc/paths.d/*`. macOS only.
    pub fn etc_paths_dirs(&self) -> Vec<PathBuf> {
        if !cfg!(target_os = "macos") {
            return Vec::new();
        }

        let mut files = vec![PathBuf::from("/etc/paths")];
        let paths_d = Path::new("/etc/paths.d");
        let mut entries = self.fs.list_dir(paths_d);
        entries.sort();
        files.extend(entries.into_iter().map(|e| paths_d.join(e)));

        files
            .iter()
            .flat_map(|file| self.fs.read_lines(file))
            .map(PathBuf::from)
            .collect()
    }

    pub fn platform_dirs() -> Vec<PathBuf> {
        PLATFORM_DIRS.iter().map(PathBuf::from).collect()
    }

    /// asdf and volta shims, then nvm's default alias, then nvm versions newest first.
    pub fn node_manager_candidates(&self, command: &str) -> Vec<PathBuf> {
        if !NODE_COMMANDS.contains(&command) {
            return Vec::new();
        }
        let Some(home) = self.env.home() else {
            return Vec::new();
        };

        let mut candidates = vec![
            home.join(".asdf/shims").join(command),
            home.join(".volta/bin").join(command),
        ];

        let nvm_versions = home.join(".nvm/versions/node");
        let default_alias = self.fs.read_lines(&home.join(".nvm/alias/default"));
        if let Some(version) = default_alias.first() {
            candidates.push(nvm_versions.join(version).join("bin").join(command));
        }

        let mut versions = self.fs.list_dir(&nvm_versions);
        versions.sort_by(|a, b| compare_versions(b, a));
        candidates.extend(
            versions
                .iter()
                .map(|v| nvm_versions.join(v).join("bin").join(command)),
        );

        candidates
    }

    #[cfg(windows)]
    fn file_names(&self, command: &str) -> Vec<String> {
        let mut names = vec![command.to_string()];
        let pathext = self
            .env
            .get("PATHEXT")
            .and_then(|p| p.into_string().ok())
            .unwrap_or_else(|| ".COM;.EXE;.BAT;.CMD".to_string());
        names.extend(
            pathext
                .split(';')
                .filter(|ext| !ext.is_empty())
                .map(|ext| format!("{command}{}", ext.to_lowercase())),
        );
        names
    }

    #[cfg(not(windows))]
    fn file_names(&self, command: &str) -> Vec<String> {
        let _ = self.env;
        vec![command.to_string()]
    }
}

/// Orders `v18.2.0` before `v20.1.0`; non-numeric parts compare as text.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parts = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    };
    parts(a).cmp(&parts(b)).then_with(|| a.cmp(b))
}
