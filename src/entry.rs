use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::path;

/// Kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FileSystemEntryType {
    File,
    Directory,
}

impl FileSystemEntryType {
    #[must_use]
    pub fn from_is_directory(is_directory: bool) -> Self {
        if is_directory {
            Self::Directory
        } else {
            Self::File
        }
    }

    #[must_use]
    pub fn is_directory(self) -> bool {
        self == Self::Directory
    }
}

impl fmt::Display for FileSystemEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// A single entry produced by enumeration.
///
/// Directory paths are always directory-indicated, file paths never are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSystemEntry {
    path: String,
    entry_type: FileSystemEntryType,
    last_modified_utc: Option<DateTime<Utc>>,
}

impl FileSystemEntry {
    #[must_use]
    pub fn new(
        path: &str,
        entry_type: FileSystemEntryType,
        last_modified_utc: Option<DateTime<Utc>>,
    ) -> Self {
        let path = match entry_type {
            FileSystemEntryType::Directory => path::ensure_directory_indicated(path),
            FileSystemEntryType::File => path::ensure_file_indicated(path),
        };

        Self {
            path,
            entry_type,
            last_modified_utc,
        }
    }

    #[must_use]
    pub fn file(path: &str, last_modified_utc: Option<DateTime<Utc>>) -> Self {
        Self::new(path, FileSystemEntryType::File, last_modified_utc)
    }

    #[must_use]
    pub fn directory(path: &str, last_modified_utc: Option<DateTime<Utc>>) -> Self {
        Self::new(path, FileSystemEntryType::Directory, last_modified_utc)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn entry_type(&self) -> FileSystemEntryType {
        self.entry_type
    }

    #[must_use]
    pub fn last_modified_utc(&self) -> Option<DateTime<Utc>> {
        self.last_modified_utc
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.entry_type.is_directory()
    }

    #[must_use]
    pub fn into_path(self) -> String {
        self.path
    }
}
