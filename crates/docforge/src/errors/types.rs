//! Error type definitions for docforge

use ephemeral_workspace::WorkspaceError;
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Workspace staging, reservation or bundling failed
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// An external engine invocation failed
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Every compression attempt failed
    #[error("Compression failed: {message}")]
    Compression { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures invoking an external processing engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// The binary could not be started
    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The binary ran and exited unsuccessfully
    #[error("{command} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The binary did not finish in time and was killed
    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The binary reported success but left no output behind
    #[error("Engine reported success but produced no output at {path:?}")]
    MissingOutput { path: PathBuf },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a terminal compression error
    pub fn compression<S: Into<String>>(message: S) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
