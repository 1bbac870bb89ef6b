//! Ghostscript `pdfwrite` adapter.

use super::{CompressionEngine, EngineError, EngineResult};
use crate::config::{EngineConfig, defaults::DEFAULT_PROBE_TIMEOUT};
use async_trait::async_trait;
use std::{
    ffi::OsString,
    path::Path,
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, warn};

const STDERR_TAIL_BYTES: usize = 512;

/// Runs `gs -sDEVICE=pdfwrite` with per-level image downsampling.
#[derive(Debug, Clone)]
pub struct GhostscriptEngine {
    command: String,
    timeout: Duration,
}

impl GhostscriptEngine {
    pub fn new<S: Into<String>>(command: S, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.ghostscript_command.clone(), config.timeout)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(&self, args: Vec<OsString>, output: &Path) -> EngineResult<()> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {} with {} arguments", self.command, args.len());

        let result = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| EngineError::Timeout {
                command: self.command.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| EngineError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = stderr_tail(&result.stderr);
            warn!(
                "{} exited with {:?} writing {:?}: {}",
                self.command,
                result.status.code(),
                output,
                stderr
            );
            return Err(EngineError::NonZeroExit {
                command: self.command.clone(),
                code: result.status.code(),
                stderr,
            });
        }

        match tokio::fs::metadata(output).await {
            Ok(metadata) if metadata.is_file() => Ok(()),
            _ => Err(EngineError::MissingOutput {
                path: output.to_path_buf(),
            }),
        }
    }
}

#[async_trait]
impl CompressionEngine for GhostscriptEngine {
    fn name(&self) -> &str {
        "ghostscript"
    }

    async fn compress_at(&self, input: &Path, output: &Path, dpi: u32) -> EngineResult<()> {
        self.run(downsample_args(input, output, dpi), output).await
    }

    async fn optimize(&self, input: &Path, output: &Path) -> EngineResult<()> {
        self.run(optimize_args(input, output), output).await
    }

    /// Runs `gs --version`.
    async fn probe(&self) -> bool {
        let mut cmd = Command::new(&self.command);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(DEFAULT_PROBE_TIMEOUT, cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!("{} probe failed: {}", self.command, e);
                false
            }
            Err(_) => false,
        }
    }
}

fn base_args() -> Vec<OsString> {
    [
        "-sDEVICE=pdfwrite",
        "-dCompatibilityLevel=1.4",
        "-dNOPAUSE",
        "-dQUIET",
        "-dBATCH",
        "-dSAFER",
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

fn output_arg(output: &Path) -> OsString {
    let mut arg = OsString::from("-sOutputFile=");
    arg.push(output);
    arg
}

pub(crate) fn downsample_args(input: &Path, output: &Path, dpi: u32) -> Vec<OsString> {
    let mut args = base_args();
    for (kind, filter) in [("Color", "/Bicubic"), ("Gray", "/Bicubic"), ("Mono", "/Subsample")] {
        args.push(format!("-dDownsample{kind}Images=true").into());
        args.push(format!("-d{kind}ImageDownsampleType={filter}").into());
        args.push(format!("-d{kind}ImageResolution={dpi}").into());
    }
    args.push(output_arg(output));
    args.push(input.into());
    args
}

pub(crate) fn optimize_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = base_args();
    args.push("-dPDFSETTINGS=/ebook".into());
    args.push(output_arg(output));
    args.push(input.into());
    args
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
