//! Host operations the engine delegates to
//!
//! The engine only orchestrates; every side effect goes through [`Host`].
//! [`LocalHost`] wires the trait to the network, platform and state crates.

use crate::detect::detect_versions;
use async_trait::async_trait;
use aucat_config::constants::{BOOTH_SESSION_FILE, HASH_CACHE_FILE, INSTALLED_FILE};
use aucat_config::Config;
use aucat_errors::Error;
use aucat_net::{GitHubSource, NetClient, NetConfig, Transfer};
use aucat_platform::CommandOutput;
use aucat_state::{HashCache, InstalledStore};
use aucat_types::{AppDirs, PackageDescriptor};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait Host: Send + Sync {
    /// Download `url` into `dest_dir` and return the written file.
    async fn download(&self, url: &str, dest_dir: &Path, transfer: &Transfer)
        -> Result<PathBuf, Error>;

    /// Download a storefront item with the stored login session.
    ///
    /// Fails with an auth-required network error when the session is missing
    /// or refused.
    async fn download_authenticated(
        &self,
        url: &str,
        dest_dir: &Path,
        transfer: &Transfer,
    ) -> Result<PathBuf, Error>;

    /// Fetch a cloud-drive file by id into `dest_dir`.
    async fn cloud_drive_download(
        &self,
        file_id: &str,
        dest_dir: &Path,
        transfer: &Transfer,
    ) -> Result<PathBuf, Error>;

    /// Download URL of the best matching release asset, if any.
    async fn github_release_asset(&self, source: &GitHubSource<'_>) -> Option<String>;

    async fn extract_archive(&self, src: &Path, dest: &Path) -> Result<(), Error>;

    async fn extract_sfx(&self, src: &Path, dest: &Path) -> Result<(), Error>;

    /// Copy everything `from` names into `to`, returning the file count.
    async fn copy_by_pattern(&self, from: &Path, to: &Path) -> Result<usize, Error>;

    /// Remove `path`; `false` when it did not exist.
    async fn delete(&self, path: &Path) -> Result<bool, Error>;

    async fn run_hidden(
        &self,
        exe: &Path,
        args: &[String],
        elevate: bool,
    ) -> Result<CommandOutput, Error>;

    async fn run_special_setup(&self, exe: &Path) -> Result<CommandOutput, Error>;

    /// Host application directory layout.
    fn app_dirs(&self) -> Result<AppDirs, Error>;

    async fn is_host_app_running(&self) -> Result<bool, Error>;

    /// Installed versions of the given packages.
    ///
    /// Packages that publish file hashes are detected from the files on
    /// disk: the matching version, `???` when files are present but match no
    /// version, or empty when none are present. Other packages report the
    /// recorded version and are omitted when nothing is recorded.
    async fn query_installed_versions(
        &self,
        packages: &[PackageDescriptor],
    ) -> Result<BTreeMap<String, String>, Error>;

    async fn record_installed(&self, id: &str, version: Option<&str>) -> Result<(), Error>;

    async fn record_removed(&self, id: &str) -> Result<(), Error>;
}

/// Production host backed by the local machine.
pub struct LocalHost {
    client: NetClient,
    dirs: AppDirs,
    installed: InstalledStore,
    hashes: HashCache,
    session_path: PathBuf,
    host_process: String,
}

impl LocalHost {
    /// Build a host from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory layout cannot be derived or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let dirs = config.app_dirs()?;
        let client = NetClient::new(NetConfig::from(&config.network))?;
        Ok(Self::new(client, dirs, config.installer.host_process.clone()))
    }

    #[must_use]
    pub fn new(client: NetClient, dirs: AppDirs, host_process: String) -> Self {
        Self {
            installed: InstalledStore::new(dirs.config_path(INSTALLED_FILE)),
            hashes: HashCache::new(dirs.config_path(HASH_CACHE_FILE)),
            session_path: dirs.config_path(BOOTH_SESSION_FILE),
            client,
            dirs,
            host_process,
        }
    }

    #[must_use]
    pub fn client(&self) -> &NetClient {
        &self.client
    }

    #[must_use]
    pub fn installed(&self) -> &InstalledStore {
        &self.installed
    }

    #[must_use]
    pub fn session_path(&self) -> &Path {
        &self.session_path
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        transfer: &Transfer,
    ) -> Result<PathBuf, Error> {
        aucat_net::download_to_dir(&self.client, url, dest_dir, transfer).await
    }

    async fn download_authenticated(
        &self,
        url: &str,
        dest_dir: &Path,
        transfer: &Transfer,
    ) -> Result<PathBuf, Error> {
        let session = aucat_net::load_session(&self.session_path).await;
        aucat_net::booth_download(&self.client, url, dest_dir, session.as_deref(), transfer).await
    }

    async fn cloud_drive_download(
        &self,
        file_id: &str,
        dest_dir: &Path,
        transfer: &Transfer,
    ) -> Result<PathBuf, Error> {
        aucat_net::drive_download(&self.client, file_id, dest_dir, transfer).await
    }

    async fn github_release_asset(&self, source: &GitHubSource<'_>) -> Option<String> {
        aucat_net::resolve_release_asset(&self.client, source).await
    }

    async fn extract_archive(&self, src: &Path, dest: &Path) -> Result<(), Error> {
        aucat_platform::extract_zip(src, dest).await
    }

    async fn extract_sfx(&self, src: &Path, dest: &Path) -> Result<(), Error> {
        aucat_platform::extract_sfx(src, dest).await
    }

    async fn copy_by_pattern(&self, from: &Path, to: &Path) -> Result<usize, Error> {
        aucat_platform::copy_by_pattern(from, to).await
    }

    async fn delete(&self, path: &Path) -> Result<bool, Error> {
        aucat_platform::delete_path(path).await
    }

    async fn run_hidden(
        &self,
        exe: &Path,
        args: &[String],
        elevate: bool,
    ) -> Result<CommandOutput, Error> {
        aucat_platform::run_hidden(exe, args, elevate).await
    }

    async fn run_special_setup(&self, exe: &Path) -> Result<CommandOutput, Error> {
        aucat_platform::run_special_setup(exe, &self.dirs.root, self.dirs.portable).await
    }

    fn app_dirs(&self) -> Result<AppDirs, Error> {
        Ok(self.dirs.clone())
    }

    async fn is_host_app_running(&self) -> Result<bool, Error> {
        let name = self.host_process.clone();
        tokio::task::spawn_blocking(move || aucat_platform::is_process_running(&name))
            .await
            .map_err(|e| Error::internal(format!("process scan failed: {e}")))
    }

    async fn query_installed_versions(
        &self,
        packages: &[PackageDescriptor],
    ) -> Result<BTreeMap<String, String>, Error> {
        let recorded = self.installed.load().await?;
        let mut versions = detect_versions(packages, &self.dirs, &self.hashes).await;
        for package in packages.iter().filter(|p| !p.has_version_hashes()) {
            if let Some(version) = recorded.get(&package.id) {
                versions.insert(package.id.clone(), version.clone());
            }
        }
        Ok(versions)
    }

    async fn record_installed(&self, id: &str, version: Option<&str>) -> Result<(), Error> {
        self.installed.record_installed(id, version).await.map(|_| ())
    }

    async fn record_removed(&self, id: &str) -> Result<(), Error> {
        self.installed.record_removed(id).await.map(|_| ())
    }
}
