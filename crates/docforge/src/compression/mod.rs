//! Size-targeted compression over a descending quality ladder.
//!
//! Levels are tried from least to most aggressive. The first candidate at or
//! under the target wins; otherwise the smallest candidate is returned as a
//! best-effort result. Superseded candidates are deleted as soon as a newer
//! one exists, unless intermediates are kept.

use crate::{
    config::{CompressionConfig, defaults::DEFAULT_QUALITY_LADDER},
    engine::CompressionEngine,
    errors::{AppError, AppResult},
};
use ephemeral_workspace::Workspace;
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, warn};

/// Prefix for every compressed output, final or intermediate
pub const COMPRESSED_PREFIX: &str = "compressed";

/// A validated, strictly descending sequence of DPI levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLadder(Vec<u32>);

impl QualityLadder {
    /// # Errors
    /// Returns `AppError::Configuration` if the ladder is empty, contains 0,
    /// or is not strictly descending.
    pub fn new(levels: Vec<u32>) -> AppResult<Self> {
        if levels.is_empty() {
            return Err(AppError::configuration("compression.ladder cannot be empty"));
        }
        if levels.contains(&0) {
            return Err(AppError::configuration("compression.ladder levels must be positive"));
        }
        if levels.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(AppError::configuration(format!(
                "compression.ladder must be strictly descending, got {levels:?}"
            )));
        }
        Ok(Self(levels))
    }

    pub fn levels(&self) -> &[u32] {
        &self.0
    }
}

impl Default for QualityLadder {
    fn default() -> Self {
        Self(DEFAULT_QUALITY_LADDER.to_vec())
    }
}

/// Result of a compression request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOutcome {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// DPI level that produced the result; `None` for the generic pass
    pub level: Option<u32>,
    /// `false` when the ladder ran out before reaching the target
    pub met_target: bool,
    /// Engine invocations made, including failures
    pub attempts: usize,
}

impl CompressionOutcome {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Drives an engine down the quality ladder, reserving every candidate in the workspace.
pub struct SizeTargetedCompressor {
    workspace: Workspace,
    engine: Arc<dyn CompressionEngine>,
    ladder: QualityLadder,
    keep_intermediates: bool,
}

impl SizeTargetedCompressor {
    pub fn new(workspace: Workspace, engine: Arc<dyn CompressionEngine>, ladder: QualityLadder) -> Self {
        Self {
            workspace,
            engine,
            ladder,
            keep_intermediates: false,
        }
    }

    pub fn from_config(
        workspace: Workspace,
        engine: Arc<dyn CompressionEngine>,
        config: &CompressionConfig,
    ) -> AppResult<Self> {
        let ladder = QualityLadder::new(config.ladder.clone())?;
        Ok(Self::new(workspace, engine, ladder).keep_intermediates(config.keep_intermediates))
    }

    /// Retain superseded candidates instead of deleting them.
    #[must_use]
    pub fn keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    /// Compress `input`, searching the ladder when `target_size` is positive.
    ///
    /// A missing or non-positive target runs one generic optimization pass.
    ///
    /// # Errors
    /// Returns `AppError::Compression` only when every ladder level and the
    /// fallback pass failed.
    pub async fn compress(&self, input: &Path, target_size: Option<i64>) -> AppResult<CompressionOutcome> {
        match target_size.and_then(|t| u64::try_from(t).ok()).filter(|t| *t > 0) {
            Some(target) => self.search(input, target).await,
            None => self.optimize_pass(input, None, 0).await,
        }
    }

    async fn search(&self, input: &Path, target: u64) -> AppResult<CompressionOutcome> {
        let mut best: Option<CompressionOutcome> = None;
        let mut attempts = 0;

        for &dpi in self.ladder.levels() {
            attempts += 1;
            let candidate = self
                .workspace
                .reserve_output_path(COMPRESSED_PREFIX, ".pdf")
                .await;

            if let Err(e) = self.engine.compress_at(input, &candidate, dpi).await {
                warn!("{} failed at {} dpi: {}", self.engine.name(), dpi, e);
                self.discard(&candidate).await;
                continue;
            }

            let size_bytes = match tokio::fs::metadata(&candidate).await {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Cannot stat candidate {:?} at {} dpi: {}", candidate, dpi, e);
                    self.discard(&candidate).await;
                    continue;
                }
            };
            let met_target = size_bytes <= target;
            debug!(
                "Candidate at {} dpi is {} bytes (target {}, met: {})",
                dpi, size_bytes, target, met_target
            );

            if let Some(previous) = best.take()
                && !self.keep_intermediates
            {
                self.discard(&previous.path).await;
            }

            best = Some(CompressionOutcome {
                path: candidate,
                size_bytes,
                level: Some(dpi),
                met_target,
                attempts,
            });

            if met_target {
                break;
            }
        }

        match best {
            Some(mut outcome) => {
                outcome.attempts = attempts;
                if outcome.met_target {
                    info!(
                        "Compressed to {} bytes at {:?} dpi (target {})",
                        outcome.size_bytes, outcome.level, target
                    );
                } else {
                    info!(
                        "Target {} bytes unreachable, returning best effort of {} bytes at {:?} dpi",
                        target, outcome.size_bytes, outcome.level
                    );
                }
                Ok(outcome)
            }
            None => {
                warn!(
                    "All {} quality levels failed, falling back to generic optimization",
                    attempts
                );
                self.optimize_pass(input, Some(target), attempts).await
            }
        }
    }

    async fn optimize_pass(
        &self,
        input: &Path,
        target: Option<u64>,
        prior_attempts: usize,
    ) -> AppResult<CompressionOutcome> {
        let output = self
            .workspace
            .reserve_output_path(COMPRESSED_PREFIX, ".pdf")
            .await;

        if let Err(e) = self.engine.optimize(input, &output).await {
            self.discard(&output).await;
            return Err(AppError::compression(e.to_string()));
        }

        let size_bytes = match tokio::fs::metadata(&output).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                self.discard(&output).await;
                return Err(AppError::compression(format!("cannot stat output: {e}")));
            }
        };

        Ok(CompressionOutcome {
            path: output,
            size_bytes,
            level: None,
            met_target: target.is_none_or(|t| size_bytes <= t),
            attempts: prior_attempts + 1,
        })
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = self.workspace.discard_artifact(path).await {
            warn!("Failed to discard compression candidate {:?}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_validation() {
        assert!(QualityLadder::new(vec![150, 100, 72]).is_ok());
        assert!(QualityLadder::new(vec![72]).is_ok());
        assert!(QualityLadder::new(vec![]).is_err());
        assert!(QualityLadder::new(vec![100, 100]).is_err());
        assert!(QualityLadder::new(vec![72, 150]).is_err());
        assert!(QualityLadder::new(vec![50, 0]).is_err());
    }

    #[test]
    fn test_default_ladder() {
        assert_eq!(QualityLadder::default().levels(), &[150, 100, 72, 50, 30, 20]);
    }
}
