use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Structural problem found on one line of a session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDefect {
    /// The file has no header line at all.
    MissingHeader,
    /// The first line is not a `session` header.
    HeaderExpected,
    /// A line after the header is not a `record`.
    RecordExpected,
    UnsupportedVersion { found: u32 },
    SequenceNotIncreasing { previous: u64, found: u64 },
    BadTimestamp { field: &'static str, value: String },
    RelativeWorkspaceRoot { workspace_root: String },
}

impl fmt::Display for LogDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader => f.write_str("no session header"),
            Self::HeaderExpected => f.write_str("expected a session header"),
            Self::RecordExpected => f.write_str("expected an event record"),
            Self::UnsupportedVersion { found } => {
                write!(f, "session version {found} is not supported (expected 1)")
            }
            Self::SequenceNotIncreasing { previous, found } => {
                write!(f, "sequence {found} does not follow {previous}")
            }
            Self::BadTimestamp { field, value } => {
                write!(f, "'{field}' is not an RFC3339 timestamp: {value}")
            }
            Self::RelativeWorkspaceRoot { workspace_root } => {
                write!(f, "workspace root {workspace_root} is not absolute")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("{operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading {path}:{line}: {source}")]
    Read {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON at {path}:{line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt session log {path}:{line}: {defect}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        defect: LogDefect,
    },

    #[error("session logs need an absolute workspace root, got {path}")]
    RelativeRoot { path: PathBuf },

    #[error("encoding a line for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("formatting the current time: {0}")]
    Clock(#[source] time::error::Format),
}

impl SessionStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, line: usize, defect: LogDefect) -> Self {
        Self::Corrupt {
            path: path.into(),
            line,
            defect,
        }
    }

    /// Defect of a corrupt log, if that is what this error is.
    #[must_use]
    pub fn defect(&self) -> Option<&LogDefect> {
        match self {
            Self::Corrupt { defect, .. } => Some(defect),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
