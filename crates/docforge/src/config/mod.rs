use anyhow::Result;
use ephemeral_workspace::RetentionPolicy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::{Path, PathBuf}, time::Duration};

pub mod defaults;
pub mod duration_serde;

use crate::{
    compression::QualityLadder,
    errors::{AppError, AppResult},
};
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public origin used to build download links
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Human-readable body limit, e.g. `100MB`
    #[serde(default = "default_max_request_size")]
    pub max_request_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    #[serde(default = "default_retention", with = "duration_serde::duration")]
    pub retention: Duration,
    /// Derived from `retention` when unset
    #[serde(
        default,
        with = "duration_serde::option_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub sweep_interval: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_ghostscript_command")]
    pub ghostscript_command: String,
    #[serde(default = "default_engine_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Strictly descending DPI levels tried in order
    #[serde(default = "default_ladder")]
    pub ladder: Vec<u32>,
    /// Keep superseded candidates until the sweeper reclaims them
    #[serde(default = "default_keep_intermediates")]
    pub keep_intermediates: bool,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_request_size() -> String {
    DEFAULT_MAX_REQUEST_SIZE.to_string()
}

// Workspace defaults
fn default_workspace_root() -> PathBuf {
    PathBuf::from(DEFAULT_WORKSPACE_ROOT)
}

fn default_retention() -> Duration {
    DEFAULT_RETENTION
}

// Engine defaults
fn default_ghostscript_command() -> String {
    DEFAULT_GHOSTSCRIPT_COMMAND.to_string()
}

fn default_engine_timeout() -> Duration {
    DEFAULT_ENGINE_TIMEOUT
}

// Compression defaults
fn default_ladder() -> Vec<u32> {
    DEFAULT_QUALITY_LADDER.to_vec()
}

fn default_keep_intermediates() -> bool {
    DEFAULT_KEEP_INTERMEDIATES
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            max_request_size: default_max_request_size(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            retention: default_retention(),
            sweep_interval: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ghostscript_command: default_ghostscript_command(),
            timeout: default_engine_timeout(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            ladder: default_ladder(),
            keep_intermediates: default_keep_intermediates(),
        }
    }
}

impl WebConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The body limit in bytes.
    pub fn max_request_bytes(&self) -> AppResult<usize> {
        parse_byte_size(&self.max_request_size).ok_or_else(|| {
            AppError::configuration(format!(
                "Invalid web.max_request_size '{}'",
                self.max_request_size
            ))
        })
    }

    /// Public link for a file in the output area.
    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}/files/{}", self.base_url.trim_end_matches('/'), file_name)
    }
}

impl WorkspaceConfig {
    pub fn retention_policy(&self) -> RetentionPolicy {
        let policy = RetentionPolicy::new().remove_after(self.retention);
        match self.sweep_interval {
            Some(interval) => policy.sweep_every(interval),
            None => policy,
        }
    }
}

impl Config {
    /// Layer defaults, the TOML file (if present) and `DOCFORGE_*` environment variables.
    pub fn load(config_file: &Path) -> Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(CONFIG_ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.workspace.retention.is_zero() {
            return Err(AppError::configuration("workspace.retention must be greater than zero"));
        }
        if self.workspace.sweep_interval.is_some_and(|i| i.is_zero()) {
            return Err(AppError::configuration("workspace.sweep_interval must be greater than zero"));
        }
        if self.web.base_url.trim().is_empty() {
            return Err(AppError::configuration("web.base_url cannot be empty"));
        }
        if self.engine.ghostscript_command.trim().is_empty() {
            return Err(AppError::configuration("engine.ghostscript_command cannot be empty"));
        }
        if self.engine.timeout.is_zero() {
            return Err(AppError::configuration("engine.timeout must be greater than zero"));
        }
        self.web.max_request_bytes()?;
        QualityLadder::new(self.compression.ladder.clone())?;
        Ok(())
    }
}

/// Parse a size such as `512`, `64KB`, `100MB` or `1GiB` into bytes (1024-based).
pub fn parse_byte_size(value: &str) -> Option<usize> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: usize = number.parse().ok()?;

    let multiplier: usize = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        _ => return None,
    };

    number.checked_mul(multiplier)
}
