use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Archive format error in {}: {reason}", path.display())]
    ArchiveFormat { path: PathBuf, reason: String },

    #[error("Hash cache at {} is unreadable: {reason}", path.display())]
    CacheCorruption { path: PathBuf, reason: String },

    #[error("Failed to persist hash cache to {}: {source}", path.display())]
    CachePersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot enumerate {}: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn archive(path: &Path, reason: impl Into<String>) -> Self {
        Error::ArchiveFormat {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    Io,
    ArchiveFormat,
    Delete,
}

/// A failure scoped to one file. Batch operations collect these instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: PathBuf,
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(path: &Path, kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(path: &Path, err: &Error) -> Self {
        let kind = match err {
            Error::ArchiveFormat { .. } => FileErrorKind::ArchiveFormat,
            _ => FileErrorKind::Io,
        };
        Self::new(path, kind, err.to_string())
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}
