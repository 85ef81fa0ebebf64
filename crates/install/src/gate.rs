//! Precondition gate run before any step

use crate::host::Host;
use aucat_errors::{Error, InstallError};
use aucat_platform::LockGuard;
use std::path::Path;

/// Refuse to start while the host application is running, then take the
/// run lock when `lock_path` is given.
///
/// # Errors
///
/// `PreconditionFailed` when the host application is running or its state
/// cannot be determined; `LockHeld` when another run owns the lock.
pub async fn check_preconditions(
    host: &dyn Host,
    lock_path: Option<&Path>,
) -> Result<Option<LockGuard>, Error> {
    match host.is_host_app_running().await {
        Ok(false) => {}
        Ok(true) => {
            return Err(InstallError::PreconditionFailed {
                message: "the host application is running; close it before continuing".to_string(),
            }
            .into());
        }
        Err(e) => {
            return Err(InstallError::PreconditionFailed {
                message: format!("could not determine whether the host application is running: {e}"),
            }
            .into());
        }
    }

    match lock_path {
        Some(path) => LockGuard::acquire(path).await.map(Some),
        None => Ok(None),
    }
}
