/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
use std::time::Duration;

// Config loading
pub const DEFAULT_CONFIG_FILE: &str = "docforge.toml";
pub const CONFIG_ENV_PREFIX: &str = "DOCFORGE_";

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_MAX_REQUEST_SIZE: &str = "100MB";
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 100 * 1024 * 1024;

// Workspace defaults
pub const DEFAULT_WORKSPACE_ROOT: &str = "./temp";
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60);

// Engine defaults
pub const DEFAULT_GHOSTSCRIPT_COMMAND: &str = "gs";
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// Compression defaults
pub const DEFAULT_QUALITY_LADDER: [u32; 6] = [150, 100, 72, 50, 30, 20];
pub const DEFAULT_KEEP_INTERMEDIATES: bool = false;
