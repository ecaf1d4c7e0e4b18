use std::fmt;
use std::path::PathBuf;

/// A command resolved to an executable.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Absolute path of the executable.
    pub path: PathBuf,
    /// Every candidate checked on the way, in order.
    pub attempts: Vec<Attempt>,
    /// Non-fatal notes, such as an absolute path that had to fall back to its basename.
    pub warnings: Vec<String>,
}

/// One checked candidate.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub candidate: PathBuf,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub const fn new(candidate: PathBuf, outcome: AttemptOutcome) -> Self {
        Self { candidate, outcome }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Ok,
    NotFound,
    NotAFile,
    NotExecutable,
    PermissionDenied,
    IoError(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::NotFound => f.write_str("not found"),
            Self::NotAFile => f.write_str("not a file"),
            Self::NotExecutable => f.write_str("not executable"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::IoError(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Command is empty")]
    EmptyCommand,

    #[error("Could not resolve '{command}' to an executable. Tried:\n{attempts}")]
    NotResolved { command: String, attempts: String },
}

impl ResolveError {
    pub fn not_resolved(command: impl Into<String>, attempts: &[Attempt]) -> Self {
        let attempts = if attempts.is_empty() {
            "  (no candidates)".to_string()
        } else {
            attempts
                .iter()
                .map(|a| format!("  {}: {}", a.candidate.display(), a.outcome))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Self::NotResolved {
            command: command.into(),
            attempts,
        }
    }
}
