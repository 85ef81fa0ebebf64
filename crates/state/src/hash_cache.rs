//! Content hashes of installed files
//!
//! Digests are XXH3-128 in lowercase hex. They are cached in a JSON file
//! keyed by path and reused while a file's modification time and size are
//! unchanged.

use crate::json::{read_json, write_json};
use aucat_errors::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::sync::Mutex;
use xxhash_rust::xxh3::xxh3_128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    #[serde(rename = "xxh3_128")]
    hash: String,
    mtime_ms: u64,
    size: u64,
}

/// Hash store persisted at `hash-cache.json`.
#[derive(Debug)]
pub struct HashCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HashCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digests of every existing file among `paths`.
    ///
    /// Missing files are left out. Files that cannot be read are logged and
    /// left out. An unreadable cache is rebuilt, and a cache that cannot be
    /// saved only costs a rehash next time.
    pub async fn hash_files(&self, paths: &BTreeSet<PathBuf>) -> BTreeMap<PathBuf, String> {
        let _guard = self.lock.lock().await;
        let mut cache: BTreeMap<String, CacheEntry> = match read_json(&self.path).await {
            Ok(cache) => cache.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "hash cache unreadable; rebuilding");
                BTreeMap::new()
            }
        };

        let mut hashes = BTreeMap::new();
        let mut computed = 0usize;
        for path in paths {
            let Some((mtime_ms, size)) = stat(path).await else {
                continue;
            };
            let key = path.to_string_lossy().into_owned();
            let cached = cache
                .get(&key)
                .filter(|e| !e.hash.is_empty() && e.mtime_ms == mtime_ms && e.size == size)
                .map(|e| e.hash.clone());
            let hash = match cached {
                Some(hash) => hash,
                None => match file_xxh3_128_hex(path).await {
                    Ok(hash) => {
                        computed += 1;
                        hash
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "hash error");
                        continue;
                    }
                },
            };
            cache.insert(
                key,
                CacheEntry {
                    hash: hash.clone(),
                    mtime_ms,
                    size,
                },
            );
            hashes.insert(path.clone(), hash);
        }

        if let Err(e) = write_json(&self.path, &cache).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to save hash cache");
        }
        tracing::debug!(files = hashes.len(), computed, "file hashes ready");
        hashes
    }
}

/// XXH3-128 of the file at `path` as 32 lowercase hex digits.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub async fn file_xxh3_128_hex(path: &Path) -> Result<String, Error> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    let digest = tokio::task::spawn_blocking(move || xxh3_128(&bytes))
        .await
        .map_err(|e| Error::internal(format!("hash task failed: {e}")))?;
    Ok(format!("{digest:032x}"))
}

/// Modification time in milliseconds and size of a regular file.
async fn stat(path: &Path) -> Option<(u64, u64)> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    let mtime = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some((u64::try_from(mtime.as_millis()).ok()?, meta.len()))
}
