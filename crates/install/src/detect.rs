//! Installed version detection by file hashes
//!
//! A package version is installed when every file it lists exists with the
//! listed XXH3-128 digest. Versions are checked newest first. When files are
//! present but match no version the result is [`UNKNOWN_VERSION`]; when none
//! of them exist it is empty.

use crate::context::ExecutionContext;
use crate::expand::expand;
use aucat_state::HashCache;
use aucat_types::{AppDirs, PackageDescriptor, VersionFile};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Marker for a package whose files are present but match no known version.
pub const UNKNOWN_VERSION: &str = "???";

/// Detect the installed version of every package that publishes file hashes.
///
/// Packages without hashes are left out of the result.
pub async fn detect_versions(
    packages: &[PackageDescriptor],
    dirs: &AppDirs,
    cache: &HashCache,
) -> BTreeMap<String, String> {
    let paths = collect_paths(packages, dirs);
    tracing::debug!(packages = packages.len(), paths = paths.len(), "detecting installed versions");
    let hashes = cache.hash_files(&paths).await;
    determine_versions(packages, dirs, &hashes)
}

/// Every distinct file path the packages' versions refer to.
#[must_use]
pub fn collect_paths(packages: &[PackageDescriptor], dirs: &AppDirs) -> BTreeSet<PathBuf> {
    packages
        .iter()
        .filter(|p| p.has_version_hashes())
        .flat_map(|p| &p.versions)
        .flat_map(|v| &v.file)
        .filter_map(|f| file_path(f, dirs))
        .collect()
}

/// Match `hashes` (path to digest of files found on disk) against each
/// package's versions.
#[must_use]
pub fn determine_versions(
    packages: &[PackageDescriptor],
    dirs: &AppDirs,
    hashes: &BTreeMap<PathBuf, String>,
) -> BTreeMap<String, String> {
    let mut detected = BTreeMap::new();
    for package in packages {
        if package.id.is_empty() || !package.has_version_hashes() {
            continue;
        }
        let mut any_present = false;
        let mut matched = None;
        for entry in package.versions.iter().rev() {
            if entry.file.is_empty() {
                continue;
            }
            let mut all_match = true;
            for file in &entry.file {
                let found = file_path(file, dirs).and_then(|path| hashes.get(&path));
                any_present |= found.is_some();
                let want = file.hash.trim();
                if want.is_empty() || !found.is_some_and(|hash| hash.eq_ignore_ascii_case(want)) {
                    all_match = false;
                    break;
                }
            }
            if all_match {
                matched = Some(entry.version.clone());
                break;
            }
        }
        let version = match matched {
            Some(version) => version,
            None if any_present => UNKNOWN_VERSION.to_string(),
            None => String::new(),
        };
        tracing::debug!(package = %package.id, version = %version, "version detected");
        detected.insert(package.id.clone(), version);
    }
    detected
}

/// Expanded location of a listed file. Run-scoped placeholders have no
/// meaning outside a run, so such paths are skipped.
fn file_path(file: &VersionFile, dirs: &AppDirs) -> Option<PathBuf> {
    if file.path.trim().is_empty() || file.path.contains("{tmp}") {
        return None;
    }
    let context = ExecutionContext::new(PathBuf::new());
    expand(&file.path, dirs, &context).ok().map(PathBuf::from)
}
