//! Error types shared by the enumerator, the scheduler and the uploaders.
//!
//! Only three things can go wrong in a run and each has its own type:
//!
//! - [`ListingError`]: the source directory could not be read. The caller
//!   gets no tasks and decides how to report it.
//! - [`TransferError`]: one upload failed. The scheduler records it on that
//!   task's outcome and keeps going.
//! - [`ConfigurationError`]: a required setting is absent or malformed.
//!   Raised before any work starts.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("directory not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied listing {0}")]
    PermissionDenied(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ListingError {
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => ListingError::NotFound(path),
            io::ErrorKind::PermissionDenied => ListingError::PermissionDenied(path),
            _ => ListingError::Io { path, source },
        }
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("remote rejected upload: {0}")]
    Remote(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("worker process failed: {0}")]
    Worker(String),
}

impl TransferError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TransferError::Io { path: path.into(), source }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Local read errors and timeouts are not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::Remote(_) | TransferError::Worker(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
