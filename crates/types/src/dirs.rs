//! Host application directory layout

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directories of the managed host application plus the engine's own
/// state directory. Resolved once per run and used for macro expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDirs {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub plugin_dir: PathBuf,
    pub script_dir: PathBuf,
    pub config_dir: PathBuf,
    pub portable: bool,
}

impl AppDirs {
    /// Derive plugin and script directories from a data directory.
    #[must_use]
    pub fn from_parts(root: PathBuf, data_dir: PathBuf, config_dir: PathBuf, portable: bool) -> Self {
        Self {
            plugin_dir: data_dir.join("Plugin"),
            script_dir: data_dir.join("Script"),
            root,
            data_dir,
            config_dir,
            portable,
        }
    }

    /// Base directory for per-run temporary directories.
    #[must_use]
    pub fn installer_tmp_root(&self) -> PathBuf {
        self.config_dir.join("installer-tmp")
    }

    #[must_use]
    pub fn config_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.config_dir.join(name)
    }
}
