//! Error types for the mirror engine

use std::io;
use std::path::{Path, PathBuf};

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for scanning, task execution and configuration
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Scan target does not exist
    #[error("Directory not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Permission errors
    #[error("Permission error at '{path}': {message}")]
    Permission { path: PathBuf, message: String },

    /// Directory scanning errors
    #[error("Directory scan error at '{path}': {message}")]
    DirectoryScan { path: PathBuf, message: String },

    /// File copying errors
    #[error("File copy error from '{source_path}' to '{destination}': {message}")]
    FileCopy {
        source_path: PathBuf,
        destination: PathBuf,
        message: String,
    },

    /// File deletion errors
    #[error("File deletion error at '{path}': {message}")]
    FileDeletion { path: PathBuf, message: String },

    /// Invalid options
    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking scan or prune task panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl SyncError {
    /// Create a new not-found error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a new permission error
    pub fn permission_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Permission {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new directory scan error
    pub fn scan_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryScan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file copy error
    pub fn copy_error(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::FileCopy {
            source_path: source.into(),
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create a new file deletion error
    pub fn deletion_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileDeletion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify an IO failure of a copy task.
    pub(crate) fn from_copy_io(
        source: &Path,
        dest: &Path,
        context: &str,
        err: io::Error,
    ) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::permission_error(dest, format!("{context}: {err}"))
        } else {
            Self::copy_error(source, dest, format!("{context}: {err}"))
        }
    }

    /// Classify an IO failure of a delete task.
    pub(crate) fn from_delete_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::permission_error(path, format!("Failed to delete file: {err}"))
        } else {
            Self::deletion_error(path, format!("Failed to delete file: {err}"))
        }
    }

    /// True for scan targets that were missing at call time
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
