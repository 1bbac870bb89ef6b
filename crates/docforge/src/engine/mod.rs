//! External compression engines.
//!
//! Engines are opaque black boxes: they read one document and write another.
//! Only argument shaping and failure classification live here.

use async_trait::async_trait;
use std::path::Path;

pub mod ghostscript;

pub use crate::errors::{EngineError, EngineResult};
pub use ghostscript::GhostscriptEngine;

/// A tool that can rewrite a PDF at a given image resolution.
#[async_trait]
pub trait CompressionEngine: Send + Sync {
    /// Short name used in logs and health output
    fn name(&self) -> &str;

    /// Rewrite `input` into `output`, downsampling images to `dpi`.
    async fn compress_at(&self, input: &Path, output: &Path, dpi: u32) -> EngineResult<()>;

    /// Generic optimization pass with no size target.
    async fn optimize(&self, input: &Path, output: &Path) -> EngineResult<()>;

    /// Whether the engine can be started at all.
    async fn probe(&self) -> bool {
        true
    }
}
