//! Per-run execution context and temp directory management

use aucat_errors::{Error, InstallError};
use aucat_types::AppDirs;
use std::path::{Path, PathBuf};

/// State threaded through one install or uninstall run.
///
/// A context is created at run entry and rebuilt after every step from that
/// step's [`StepOutput`]; it is never shared between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    tmp_dir: PathBuf,
    download_path: Option<PathBuf>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(tmp_dir: PathBuf) -> Self {
        Self {
            tmp_dir,
            download_path: None,
        }
    }

    #[must_use]
    pub fn with_download(mut self, path: PathBuf) -> Self {
        self.download_path = Some(path);
        self
    }

    #[must_use]
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    #[must_use]
    pub fn download_path(&self) -> Option<&Path> {
        self.download_path.as_deref()
    }

    /// The downloaded file.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::DownloadNotReady` when no download step has run.
    pub fn require_download(&self) -> Result<&Path, InstallError> {
        self.download_path()
            .ok_or(InstallError::DownloadNotReady)
    }

    /// Fold a step's output into the context for the next step.
    #[must_use]
    pub fn apply(self, output: StepOutput) -> Self {
        match output {
            StepOutput::Unchanged => self,
            StepOutput::Downloaded(path) => self.with_download(path),
        }
    }
}

/// What a step contributes to the context of the steps after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    Unchanged,
    Downloaded(PathBuf),
}

/// Create (or reuse) `<config_dir>/installer-tmp/<key>`.
///
/// # Errors
///
/// Returns `InstallError::TempDirFailed` if the directory cannot be created.
pub async fn prepare_tmp_dir(dirs: &AppDirs, key: &str) -> Result<PathBuf, Error> {
    let path = dirs.installer_tmp_root().join(key);
    tokio::fs::create_dir_all(&path)
        .await
        .map_err(|e| InstallError::TempDirFailed {
            message: format!("{}: {e}", path.display()),
        })?;
    Ok(path)
}

/// Remove a run's temp directory, logging instead of failing.
pub async fn remove_tmp_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed temp dir"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove temp dir"),
    }
}
