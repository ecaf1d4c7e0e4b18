//! Injectable access to the environment, filesystem and login shell.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::types::AttemptOutcome;

pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<OsString>;

    fn home(&self) -> Option<PathBuf> {
        self.get("HOME").map(PathBuf::from)
    }
}

pub trait FsProvider {
    /// Whether `path` is an existing executable file.
    fn check_executable(&self, path: &Path) -> AttemptOutcome;

    /// Non-empty, non-comment lines of a text file; empty if unreadable.
    fn read_lines(&self, path: &Path) -> Vec<String>;

    /// Entry names of a directory; empty if unreadable.
    fn list_dir(&self, path: &Path) -> Vec<String>;
}

/// Last-resort lookup through the user's shell.
pub trait ShellLookup {
    fn command_v(&self, command: &str) -> Option<PathBuf>;
}

pub struct SystemEnv;

impl EnvProvider for SystemEnv {
    fn get(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }

    fn home(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

pub struct SystemFs;

impl FsProvider for SystemFs {
    fn check_executable(&self, path: &Path) -> AttemptOutcome {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                return match e.kind() {
                    std::io::ErrorKind::NotFound => AttemptOutcome::NotFound,
                    std::io::ErrorKind::PermissionDenied => AttemptOutcome::PermissionDenied,
                    _ => AttemptOutcome::IoError(e.to_string()),
                };
            }
        };

        if !metadata.is_file() {
            return AttemptOutcome::NotAFile;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return AttemptOutcome::NotExecutable;
            }
        }

        AttemptOutcome::Ok
    }

    fn read_lines(&self, path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .map(|contents| {
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn list_dir(&self, path: &Path) -> Vec<String> {
        std::fs::read_dir(path)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter_map(|e| e.file_name().into_string().ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Runs `sh -c 'command -v "$1"'` with the command as a positional argument.
pub struct SystemShell;

impl ShellLookup for SystemShell {
    fn command_v(&self, command: &str) -> Option<PathBuf> {
        if cfg!(windows) {
            return None;
        }

        let output = Command::new("sh")
            .args(["-c", "command -v \"$1\"", "sh", command])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
        // Builtins and aliases print a bare name
        let path = PathBuf::from(found);
        path.is_absolute().then_some(path)
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MockEnv {
    vars: std::collections::HashMap<String, OsString>,
}

#[cfg(test)]
impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
impl EnvProvider for MockEnv {
    fn get(&self, key: &str) -> Option<OsString> {
        self.vars.get(key).cloned()
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MockFs {
    executables: std::collections::HashSet<PathBuf>,
    non_executables: std::collections::HashSet<PathBuf>,
    files: std::collections::HashMap<PathBuf, Vec<String>>,
    dirs: std::collections::HashMap<PathBuf, Vec<String>>,
}

#[cfg(test)]
impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executables.insert(path.into());
        self
    }

    #[must_use]
    pub fn with_non_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.non_executables.insert(path.into());
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, lines: &[&str]) -> Self {
        self.files
            .insert(path.into(), lines.iter().map(|l| (*l).to_string()).collect());
        self
    }

    #[must_use]
    pub fn with_dir(mut self, path: impl Into<PathBuf>, entries: &[&str]) -> Self {
        self.dirs
            .insert(path.into(), entries.iter().map(|e| (*e).to_string()).collect());
        self
    }
}

#[cfg(test)]
impl FsProvider for MockFs {
    fn check_executable(&self, path: &Path) -> AttemptOutcome {
        if self.executables.contains(path) {
            AttemptOutcome::Ok
        } else if self.non_executables.contains(path) {
            AttemptOutcome::NotExecutable
        } else {
            AttemptOutcome::NotFound
        }
    }

    fn read_lines(&self, path: &Path) -> Vec<String> {
        self.files.get(path).cloned().unwrap_or_default()
    }

    fn list_dir(&self, path: &Path) -> Vec<String> {
        self.dirs.get(path).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MockShell {
    answers: std::collections::HashMap<String, PathBuf>,
}

#[cfg(test)]
impl MockShell {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_answer(mut self, command: &str, path: impl Into<PathBuf>) -> Self {
        self.answers.insert(command.to_string(), path.into());
        self
    }
}

#[cfg(test)]
impl ShellLookup for MockShell {
    fn command_v(&self, command: &str) -> Option<PathBuf> {
        self.answers.get(command).cloned()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_system_fs_outcomes() {
        let dir = TempDir::new().unwrap();

        let script = dir.path().join("server");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let data = dir.path().join("data.txt");
        fs::write(&data, "x").unwrap();
        fs::set_permissions(&data, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(SystemFs.check_executable(&script), AttemptOutcome::Ok);
        assert_eq!(SystemFs.check_executable(&data), AttemptOutcome::NotExecutable);
        assert_eq!(SystemFs.check_executable(dir.path()), AttemptOutcome::NotAFile);
        assert_eq!(
            SystemFs.check_executable(&dir.path().join("missing")),
            AttemptOutcome::NotFound
        );
    }

    #[test]
    fn test_system_fs_read_lines_skips_comments() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("paths");
        fs::write(&file, "# comment\n/usr/local/bin\n\n  /opt/bin  \n").unwrap();

        assert_eq!(SystemFs.read_lines(&file), vec!["/usr/local/bin", "/opt/bin"]);
        assert!(SystemFs.read_lines(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_system_shell_finds_sh() {
        let found = SystemShell.command_v("sh").expect("sh should be resolvable");
        assert!(found.is_absolute());
        assert!(SystemShell.command_v("definitely-not-a-command-4711").is_none());
    }
}
