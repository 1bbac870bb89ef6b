//! # Ephemeral Workspace
//!
//! Sandboxed working directories whose every file is tracked and reclaimed after a
//! time-to-live.
//!
//! Uploaded inputs are staged under `uploads/`, generated outputs are reserved under
//! `output/`, and each path is registered with an [`ArtifactRegistry`] before it is
//! handed back. A [`RetentionSweeper`] running in the background deletes anything
//! older than the configured retention.
//!
//! ## Features
//!
//! - **Reserve before write**: output paths are registered before the file exists
//! - **Unique names**: random tokens, never request sequence numbers
//! - **Scratch directories**: per-operation intermediates with explicit discard
//! - **Bundling**: deflate zip archives of a directory's top-level files
//! - **Restart adoption**: files left by a previous run are swept on schedule
//!
//! ## Basic Usage
//!
//! ```rust
//! use ephemeral_workspace::{RetentionPolicy, Workspace};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workspace = Workspace::builder()
//!     .root("/var/lib/docforge")
//!     .retention(RetentionPolicy::new().remove_after(Duration::from_secs(10 * 60)))
//!     .build()
//!     .await?;
//!
//! let sweeper = workspace.sweeper().spawn();
//!
//! let mut upload: &[u8] = b"%PDF-1.7";
//! let input = workspace.stage_upload(&mut upload, Some("report.pdf")).await?;
//! let output = workspace.reserve_output_path("compressed", ".pdf").await;
//! tokio::fs::copy(&input, &output).await?;
//!
//! sweeper.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod error;
pub mod policy;
pub mod registry;
pub mod security;
pub mod sweeper;
pub mod workspace;

pub use bundle::bundle_directory;
pub use error::{Result, WorkspaceError};
pub use policy::{DEFAULT_RETENTION, RetentionPolicy};
pub use registry::{ArtifactEntry, ArtifactRegistry, RegistryStats};
pub use sweeper::{RetentionSweeper, SweeperHandle};
pub use workspace::{
    DEFAULT_UPLOAD_EXTENSION, OUTPUT_DIR, UPLOADS_DIR, Workspace, WorkspaceBuilder,
};
