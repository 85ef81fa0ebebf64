#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for aucat
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (`<config dir>/aucat/config.toml`)
//! - Environment variables (`AUCAT_*`)
//! - CLI flags (applied by the caller)

pub mod constants;
pub mod core;

pub use self::core::{
    GeneralConfig, InstallerConfig, NetworkConfig, PathConfig, TelemetryConfig,
};

use aucat_errors::{ConfigError, Error};
use aucat_types::AppDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub installer: InstallerConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        Ok(Self::system_config_dir()?.join(constants::CONFIG_FILE))
    }

    fn system_config_dir() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(constants::APP_DIR_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save_to_file(&self, path: &Path) -> Result<(), Error> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            error: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }
        fs::write(path, contents)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(root) = std::env::var("AUCAT_APP_ROOT") {
            if !root.trim().is_empty() {
                self.paths.app_root = Some(PathBuf::from(root));
            }
        }

        if let Ok(portable) = std::env::var("AUCAT_PORTABLE") {
            self.paths.portable = parse_bool("AUCAT_PORTABLE", portable)?;
        }

        if let Ok(dev) = std::env::var("AUCAT_DEV_MODE") {
            self.general.dev_mode = parse_bool("AUCAT_DEV_MODE", dev)?;
        }

        if let Ok(timeout) = std::env::var("AUCAT_STEP_TIMEOUT") {
            self.installer.step_timeout =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "AUCAT_STEP_TIMEOUT".to_string(),
                    value: timeout,
                })?;
        }

        if let Ok(endpoint) = std::env::var("AUCAT_TELEMETRY_ENDPOINT") {
            self.telemetry.endpoint = endpoint;
        }

        if let Ok(opt_out) = std::env::var("AUCAT_TELEMETRY_OPT_OUT") {
            self.telemetry.opt_out = parse_bool("AUCAT_TELEMETRY_OPT_OUT", opt_out)?;
        }

        if let Ok(key) = std::env::var("AUCAT_DRIVE_API_KEY") {
            self.network.drive_api_key = key;
        }

        Ok(())
    }

    /// The engine's own state directory (temp dirs, queues, session).
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and the system config
    /// directory cannot be determined.
    pub fn config_dir(&self) -> Result<PathBuf, Error> {
        match non_empty(self.paths.config_dir.as_ref()) {
            Some(dir) => Ok(dir.to_path_buf()),
            None => Self::system_config_dir(),
        }
    }

    /// Resolve the host application's directories.
    ///
    /// The data directory is `<root>/data` in portable mode and
    /// `%PROGRAMDATA%/aviutl2` otherwise, unless overridden.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when no application root is set.
    pub fn app_dirs(&self) -> Result<AppDirs, Error> {
        let root = non_empty(self.paths.app_root.as_ref())
            .ok_or_else(|| ConfigError::MissingField {
                field: "app_root".to_string(),
            })?
            .to_path_buf();

        let data_dir = match non_empty(self.paths.data_dir.as_ref()) {
            Some(dir) => dir.to_path_buf(),
            None if self.paths.portable => root.join("data"),
            None => std::env::var_os("PROGRAMDATA")
                .map_or_else(|| PathBuf::from(constants::DEFAULT_PROGRAM_DATA), PathBuf::from)
                .join(constants::SHARED_DATA_DIR_NAME),
        };

        Ok(AppDirs::from_parts(
            root,
            data_dir,
            self.config_dir()?,
            self.paths.portable,
        ))
    }

    /// Directory for JSON log files
    ///
    /// # Errors
    ///
    /// Propagates [`Config::config_dir`] failures.
    pub fn logs_dir(&self) -> Result<PathBuf, Error> {
        Ok(self.config_dir()?.join(constants::LOGS_DIR))
    }
}

fn non_empty(path: Option<&PathBuf>) -> Option<&Path> {
    path.map(PathBuf::as_path)
        .filter(|p| !p.as_os_str().is_empty())
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}
