//! Error types for the ephemeral workspace.

use std::path::PathBuf;

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Errors that can occur while staging, reserving or bundling artifacts.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Stream read or file write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path validation failed - potential security issue
    #[error("Path validation failed: {path:?} - {reason}")]
    PathValidation { path: PathBuf, reason: String },

    /// Directory creation failed
    #[error("Failed to create directory: {path:?} - {source}")]
    DirectoryCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Archive construction failed
    #[error("Bundling failed for {source_dir:?}: {reason}")]
    Bundling { source_dir: PathBuf, reason: String },

    /// Permissions error
    #[error("Permission denied: {operation} on {path:?}")]
    Permission { operation: String, path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl WorkspaceError {
    pub(crate) fn bundling<S: Into<String>>(source_dir: &std::path::Path, reason: S) -> Self {
        Self::Bundling {
            source_dir: source_dir.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn path_validation<S: Into<String>>(path: &std::path::Path, reason: S) -> Self {
        Self::PathValidation {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
