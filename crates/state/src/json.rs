//! JSON file helpers shared by the stores

use aucat_errors::{Error, StateError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read `path` as JSON. A missing or blank file yields `None`.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io_with_path(&e, path)),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw).map(Some).map_err(|e| {
        StateError::StateCorrupted {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Write `value` as pretty JSON through a temporary sibling file.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let write_failed = |message: String| -> Error {
        StateError::WriteFailed {
            path: path.display().to_string(),
            message,
        }
        .into()
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
    }
    let body = serde_json::to_string_pretty(value).map_err(|e| write_failed(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| write_failed(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| write_failed(e.to_string()))
}

/// Remove `path`, treating a missing file as success.
pub(crate) async fn remove_file(path: &Path) -> Result<(), Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}
