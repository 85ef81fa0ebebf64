//! Installed package versions (`installed.json`)

use crate::json::{read_json, write_json};
use aucat_errors::Error;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Map of package id to installed version, persisted as a flat JSON object.
///
/// Mutations are serialised through an internal lock so concurrent runs in
/// the same process never lose each other's writes.
#[derive(Debug)]
pub struct InstalledStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl InstalledStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full map; a missing file is an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<BTreeMap<String, String>, Error> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    /// Version recorded for `id`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`InstalledStore::load`].
    pub async fn get(&self, id: &str) -> Result<Option<String>, Error> {
        Ok(self.load().await?.remove(id))
    }

    /// Record `id` as installed at `version` (empty when unknown) and return
    /// the updated map.
    ///
    /// # Errors
    ///
    /// Returns an error if the map cannot be read or written.
    pub async fn record_installed(
        &self,
        id: &str,
        version: Option<&str>,
    ) -> Result<BTreeMap<String, String>, Error> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.insert(id.to_string(), version.unwrap_or_default().to_string());
        write_json(&self.path, &map).await?;
        tracing::debug!(package = id, version = ?version, "recorded installed version");
        Ok(map)
    }

    /// Forget `id` and return the updated map.
    ///
    /// # Errors
    ///
    /// Returns an error if the map cannot be read or written.
    pub async fn record_removed(&self, id: &str) -> Result<BTreeMap<String, String>, Error> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(id).is_some() {
            write_json(&self.path, &map).await?;
            tracing::debug!(package = id, "removed installed version");
        }
        Ok(map)
    }
}
