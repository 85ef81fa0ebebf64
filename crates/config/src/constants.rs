//! File and directory names inside the engine's config directory

pub const APP_DIR_NAME: &str = "aucat";
pub const CONFIG_FILE: &str = "config.toml";

pub const LOGS_DIR: &str = "logs";
pub const INSTALLER_TMP_DIR: &str = "installer-tmp";

pub const INSTALLED_FILE: &str = "installed.json";
pub const PENDING_EVENTS_FILE: &str = "pending_events.json";
pub const PACKAGE_STATE_FILE: &str = "package_state.json";
pub const BOOTH_SESSION_FILE: &str = "booth_session";
pub const LOCK_FILE: &str = "installer.lock";
pub const HASH_CACHE_FILE: &str = "hash-cache.json";

/// Fallback for `%PROGRAMDATA%` when the variable is unset.
pub const DEFAULT_PROGRAM_DATA: &str = "C:/ProgramData";
pub const SHARED_DATA_DIR_NAME: &str = "aviutl2";
