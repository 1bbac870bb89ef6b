//! Centralized error handling for docforge
//!
//! # Error Categories
//!
//! - **Workspace Errors**: staging, reservation, bundling and path validation
//! - **Engine Errors**: an external tool could not be started, failed or timed out
//! - **Validation Errors**: malformed requests
//! - **Compression Errors**: no quality level or fallback pass produced an output
//!
//! # Usage
//!
//! ```rust
//! use docforge::errors::{AppError, AppResult};
//!
//! fn parse_target(raw: &str) -> AppResult<i64> {
//!     raw.parse()
//!         .map_err(|_| AppError::validation(format!("Invalid targetSize '{raw}'")))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for engine invocations
pub type EngineResult<T> = Result<T, EngineError>;
