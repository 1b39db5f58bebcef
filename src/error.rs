use std::io;
use thiserror::Error;

use crate::entry::FileSystemEntryType;

pub type Result<T> = std::result::Result<T, Error>;

/// Enum for remote filesystem errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The target is absent where it was required to exist
    #[error("Path not found: {path}")]
    NotFound { path: String },
    /// The target exists but is of the other entry type
    #[error("Path was not a {expected}: {path}")]
    TypeMismatch {
        path: String,
        expected: FileSystemEntryType,
    },
    /// The destination file exists and overwriting was not allowed
    #[error("Cannot overwrite existing file: {path}")]
    OverwriteDenied { path: String },
    /// Source of a bulk copy or move is missing
    #[error("Source does not exist: {path}")]
    SourceNotFound { path: String },
    /// A remote shell command exited with a non-zero status
    #[error("Command `{command}` failed with exit status {exit_status}:\n{output}")]
    RemoteCommandFailed {
        command: String,
        exit_status: u32,
        output: String,
    },
    /// Bulk listing output was malformed
    #[error("Malformed listing at line {line} ({reason}): {text:?}")]
    ParseError {
        line: usize,
        text: String,
        reason: &'static str,
    },
    /// Failure reported by the transfer session
    #[error("Transfer: {0}")]
    Transfer(String),
    /// Failure reported by the command session
    #[error("Command: {0}")]
    Command(String),
    /// Any errors related to local I/O
    #[error("I/O: {0}")]
    IO(String),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::IO(error.to_string())
    }
}

impl Error {
    pub(crate) fn type_mismatch<P: Into<String>>(path: P, expected: FileSystemEntryType) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected,
        }
    }

    pub(crate) fn parse<T: Into<String>>(line: usize, text: T, reason: &'static str) -> Self {
        Self::ParseError {
            line,
            text: text.into(),
            reason,
        }
    }

    /// Returns `true` for the error kinds raised when a path is missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::SourceNotFound { .. })
    }
}
