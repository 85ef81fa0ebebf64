//! Cross-process run lock
//!
//! The lock file holds the owner's process id. A file whose owner is gone
//! (the run crashed or was killed) is reclaimed by the next run.

use crate::process::is_pid_alive;
use aucat_errors::{Error, InstallError};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Age after which a lock file without a readable owner counts as abandoned.
const UNOWNED_GRACE: Duration = Duration::from_secs(10);

/// RAII guard for the installer lock file; the file is removed on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    _file: File,
}

impl LockGuard {
    /// Create the lock file exclusively and record this process as owner.
    ///
    /// An existing lock whose owner process is no longer running is removed
    /// and taken over once.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::LockHeld` if a live process owns the lock, or an
    /// I/O error if the file cannot be created.
    pub async fn acquire(lock_path: &Path) -> Result<Self, Error> {
        if let Some(parent) = lock_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let mut reclaimed = false;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(lock_path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(std::process::id().to_string().as_bytes())
                        .await
                        .map_err(|e| Error::io_with_path(&e, lock_path))?;
                    file.flush()
                        .await
                        .map_err(|e| Error::io_with_path(&e, lock_path))?;
                    tracing::debug!(path = %lock_path.display(), "installer lock acquired");
                    return Ok(Self {
                        path: lock_path.to_path_buf(),
                        _file: file,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if reclaimed || !is_abandoned(lock_path).await {
                        return Err(InstallError::LockHeld {
                            path: lock_path.display().to_string(),
                        }
                        .into());
                    }
                    tracing::warn!(path = %lock_path.display(), "removing abandoned installer lock");
                    match tokio::fs::remove_file(lock_path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(Error::io_with_path(&e, lock_path)),
                    }
                    reclaimed = true;
                }
                Err(e) => return Err(Error::io_with_path(&e, lock_path)),
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Owner process id recorded in the lock file, if it can be read.
pub async fn lock_owner(lock_path: &Path) -> Option<u32> {
    let text = tokio::fs::read_to_string(lock_path).await.ok()?;
    text.trim().parse().ok()
}

async fn is_abandoned(lock_path: &Path) -> bool {
    match lock_owner(lock_path).await {
        Some(pid) if pid == std::process::id() => false,
        Some(pid) => !is_pid_alive(pid),
        // An owner may not have written its id yet; only old files count.
        None => tokio::fs::metadata(lock_path)
            .await
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > UNOWNED_GRACE),
    }
}
