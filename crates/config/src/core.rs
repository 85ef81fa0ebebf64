//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    /// Keep per-run temporary directories after successful runs
    #[serde(default)]
    pub dev_mode: bool,
}

/// Host application layout
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    #[serde(default)]
    pub app_root: Option<PathBuf>,
    /// Data lives under `<app_root>/data` instead of the shared data dir
    #[serde(default)]
    pub portable: bool,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64, // seconds
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default = "default_github_api")]
    pub github_api: String,
    #[serde(default = "default_drive_api")]
    pub drive_api: String,
    #[serde(default)]
    pub drive_api_key: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            allow_http: false,
            github_api: default_github_api(),
            drive_api: default_drive_api(),
            drive_api_key: String::new(),
        }
    }
}

/// Step execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Per-step timeout in seconds, 0 disables it
    #[serde(default)]
    pub step_timeout: u64,
    /// Fail the step when an archive cannot be extracted
    #[serde(default)]
    pub strict_extract: bool,
    #[serde(default = "default_host_process")]
    pub host_process: String,
    #[serde(default = "default_lock_file")]
    pub lock_file: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            step_timeout: 0,
            strict_extract: false,
            host_process: default_host_process(),
            lock_file: default_lock_file(),
        }
    }
}

/// Anonymous install statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub opt_out: bool,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u64, // seconds
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            opt_out: false,
            snapshot_interval: default_snapshot_interval(),
        }
    }
}

impl TelemetryConfig {
    /// Whether events should be posted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.opt_out && !self.endpoint.trim().is_empty()
    }
}

// Default value functions for serde
fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1 // 1 second
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_drive_api() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_host_process() -> String {
    "aviutl2.exe".to_string()
}

fn default_lock_file() -> bool {
    true
}

fn default_snapshot_interval() -> u64 {
    7 * 24 * 60 * 60
}
