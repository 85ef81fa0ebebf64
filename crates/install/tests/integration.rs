//! Integration tests for the execution engine

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use aucat_errors::{Error, InstallError, NetworkError, PlatformError};
    use aucat_events::{AppEvent, ProgressEvent, ProgressPhase, UninstallEvent};
    use aucat_install::*;
    use aucat_net::{GitHubSource, Transfer};
    use aucat_platform::CommandOutput;
    use aucat_types::{
        AppDirs, InstallStep, InstallerSpec, PackageDescriptor, RunSpec, SourceSpec,
        UninstallStep,
    };
    use futures::future::BoxFuture;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct FakeState {
        calls: Vec<String>,
        copy_count: usize,
        run_exit_code: i32,
        extract_fails: bool,
        auth_refusals: usize,
        auth_attempts: usize,
        download_hangs: bool,
        transfer_reports: Vec<(u64, Option<u64>)>,
        existing: BTreeSet<PathBuf>,
        installed: BTreeMap<String, String>,
    }

    /// Recording host; `running: None` makes the process query fail.
    struct FakeHost {
        dirs: AppDirs,
        running: Option<bool>,
        state: Mutex<FakeState>,
    }

    impl FakeHost {
        fn new(dir: &TempDir) -> Self {
            let root = dir.path().to_path_buf();
            Self {
                dirs: AppDirs::from_parts(
                    root.clone(),
                    root.join("data"),
                    root.join("config"),
                    true,
                ),
                running: Some(false),
                state: Mutex::new(FakeState {
                    copy_count: 1,
                    ..FakeState::default()
                }),
            }
        }

        fn configure(self, f: impl FnOnce(&mut FakeState)) -> Self {
            f(&mut self.state.lock().unwrap());
            self
        }

        fn record(&self, call: String) {
            self.state.lock().unwrap().calls.push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    #[async_trait]
    impl Host for FakeHost {
        async fn download(
            &self,
            url: &str,
            dest_dir: &Path,
            transfer: &Transfer,
        ) -> Result<PathBuf, Error> {
            self.record(format!("download {url}"));
            let (hangs, reports) = {
                let state = self.state.lock().unwrap();
                (state.download_hangs, state.transfer_reports.clone())
            };
            if hangs {
                std::future::pending::<()>().await;
            }
            for (read, total) in reports {
                transfer.report(read, total);
            }
            Ok(dest_dir.join("asset.zip"))
        }

        async fn download_authenticated(
            &self,
            url: &str,
            dest_dir: &Path,
            transfer: &Transfer,
        ) -> Result<PathBuf, Error> {
            self.record(format!("booth {url}"));
            let (refused, reports) = {
                let mut state = self.state.lock().unwrap();
                state.auth_attempts += 1;
                (
                    state.auth_attempts <= state.auth_refusals,
                    state.transfer_reports.clone(),
                )
            };
            for (read, total) in reports {
                transfer.report(read, total);
            }
            if refused {
                return Err(NetworkError::AuthRequired {
                    url: url.to_string(),
                }
                .into());
            }
            Ok(dest_dir.join("booth.zip"))
        }

        async fn cloud_drive_download(
            &self,
            file_id: &str,
            dest_dir: &Path,
            _transfer: &Transfer,
        ) -> Result<PathBuf, Error> {
            self.record(format!("drive {file_id}"));
            Ok(dest_dir.join(file_id))
        }

        async fn github_release_asset(&self, source: &GitHubSource<'_>) -> Option<String> {
            self.record(format!("github {}/{}", source.owner, source.repo));
            Some(format!(
                "https://github.com/{}/{}/releases/download/v1/a.zip",
                source.owner, source.repo
            ))
        }

        async fn extract_archive(&self, src: &Path, dest: &Path) -> Result<(), Error> {
            self.record(format!("extract {} -> {}", src.display(), dest.display()));
            if self.state.lock().unwrap().extract_fails {
                return Err(PlatformError::InvalidArchive {
                    path: src.display().to_string(),
                    message: "truncated".to_string(),
                }
                .into());
            }
            Ok(())
        }

        async fn extract_sfx(&self, src: &Path, dest: &Path) -> Result<(), Error> {
            self.record(format!("sfx {} -> {}", src.display(), dest.display()));
            Ok(())
        }

        async fn copy_by_pattern(&self, from: &Path, to: &Path) -> Result<usize, Error> {
            self.record(format!("copy {} -> {}", from.display(), to.display()));
            Ok(self.state.lock().unwrap().copy_count)
        }

        async fn delete(&self, path: &Path) -> Result<bool, Error> {
            self.record(format!("delete {}", path.display()));
            Ok(self.state.lock().unwrap().existing.remove(path))
        }

        async fn run_hidden(
            &self,
            exe: &Path,
            args: &[String],
            elevate: bool,
        ) -> Result<CommandOutput, Error> {
            self.record(format!("run {} {args:?} {elevate}", exe.display()));
            let exit_code = self.state.lock().unwrap().run_exit_code;
            Ok(CommandOutput {
                exit_code,
                stdout: Vec::new(),
                stderr: if exit_code == 0 { Vec::new() } else { b"boom".to_vec() },
            })
        }

        async fn run_special_setup(&self, exe: &Path) -> Result<CommandOutput, Error> {
            self.record(format!("setup {}", exe.display()));
            Ok(CommandOutput {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }

        fn app_dirs(&self) -> Result<AppDirs, Error> {
            Ok(self.dirs.clone())
        }

        async fn is_host_app_running(&self) -> Result<bool, Error> {
            self.running
                .ok_or_else(|| Error::internal("process table unavailable"))
        }

        async fn query_installed_versions(
            &self,
            packages: &[PackageDescriptor],
        ) -> Result<BTreeMap<String, String>, Error> {
            let mut installed = self.state.lock().unwrap().installed.clone();
            installed.retain(|id, _| packages.iter().any(|p| p.id == *id));
            Ok(installed)
        }

        async fn record_installed(&self, id: &str, version: Option<&str>) -> Result<(), Error> {
            self.record(format!("record_installed {id}"));
            self.state
                .lock()
                .unwrap()
                .installed
                .insert(id.to_string(), version.unwrap_or("").to_string());
            Ok(())
        }

        async fn record_removed(&self, id: &str) -> Result<(), Error> {
            self.record(format!("record_removed {id}"));
            self.state.lock().unwrap().installed.remove(id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAuth {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl AuthSurface for FakeAuth {
        fn wait_login_complete(&self) -> BoxFuture<'static, Result<(), Error>> {
            Box::pin(async { Ok(()) })
        }

        async fn open(&self, _url: &str) -> Result<(), Error> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn package(source: SourceSpec, install: Vec<InstallStep>) -> PackageDescriptor {
        PackageDescriptor {
            id: "Author.Pkg".to_string(),
            latest_version: Some("1.0".to_string()),
            installer: InstallerSpec {
                source,
                install,
                uninstall: Vec::new(),
            },
            versions: Vec::new(),
        }
    }

    fn direct() -> SourceSpec {
        SourceSpec::Direct("https://example.com/pkg.zip".to_string())
    }

    fn copy(from: &str, to: &str) -> InstallStep {
        InstallStep::Copy {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
        }
    }

    fn run(path: &str) -> InstallStep {
        InstallStep::Run(RunSpec {
            path: path.to_string(),
            args: vec!["/S".to_string(), "{appDir}".to_string()],
            elevate: false,
        })
    }

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p: &ProgressEvent| {
            sink.lock().unwrap().push(p.clone());
        });
        (callback, seen)
    }

    fn step_failure(err: &Error) -> (usize, usize, String, InstallError) {
        match err {
            Error::Install(InstallError::StepFailed {
                index,
                total,
                action,
                source,
                ..
            }) => match source.as_ref() {
                Error::Install(cause) => (*index, *total, action.clone(), cause.clone()),
                other => panic!("unexpected cause: {other:?}"),
            },
            other => panic!("expected a step failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_install_reports_monotonic_progress_ending_done() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| {
            s.transfer_reports = vec![(25, Some(100)), (100, Some(100))];
        }));
        let pkg = package(
            direct(),
            vec![
                InstallStep::Download,
                InstallStep::Extract { from: None, to: None },
                copy("{tmp}/*.auo", "{pluginsDir}"),
                run("{tmp}/setup.exe"),
            ],
        );
        let (callback, seen) = recorder();

        Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new().with_progress(callback))
            .await
            .unwrap();

        let events = seen.lock().unwrap().clone();
        assert_eq!(events.first().unwrap().phase, ProgressPhase::Init);
        assert!(events.windows(2).all(|w| w[0].ratio <= w[1].ratio));
        let last = events.last().unwrap();
        assert_eq!(last.phase, ProgressPhase::Done);
        assert!((last.ratio - 1.0).abs() < f64::EPSILON);
        assert!(events.iter().any(|e| e.phase == ProgressPhase::Running
            && e.step.as_deref() == Some("download")
            && e.ratio > 0.0
            && e.ratio < 0.25));

        let calls = host.calls();
        assert_eq!(calls[0], "download https://example.com/pkg.zip");
        let tmp = host.dirs.installer_tmp_root().join("Author.Pkg-1.0");
        assert_eq!(
            calls[1],
            format!("extract {} -> {}", tmp.join("asset.zip").display(), tmp.display())
        );
        assert_eq!(
            calls[2],
            format!(
                "copy {} -> {}",
                tmp.join("*.auo").display(),
                host.dirs.plugin_dir.display()
            )
        );
        assert!(calls[3].contains(&format!("{:?}", host.dirs.root.display().to_string())));
        assert_eq!(host.count("record_installed Author.Pkg"), 1);
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn third_of_five_failing_stops_the_run() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.copy_count = 0));
        let pkg = package(
            direct(),
            vec![
                InstallStep::Download,
                InstallStep::Extract { from: None, to: None },
                copy("{tmp}/*.auo", "{pluginsDir}"),
                run("{tmp}/a.exe"),
                run("{tmp}/b.exe"),
            ],
        );
        let (callback, seen) = recorder();

        let err = Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new().with_progress(callback))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("[installer Author.Pkg] step 3/5 action=copy failed"));
        let (index, total, action, cause) = step_failure(&err);
        assert_eq!((index, total, action.as_str()), (3, 5, "copy"));
        assert!(matches!(cause, InstallError::CopyMatchedNothing { .. }));
        assert_eq!(host.count("run"), 0);
        assert_eq!(host.count("record_installed"), 0);
        assert_eq!(
            seen.lock().unwrap().last().unwrap().phase,
            ProgressPhase::Error
        );
    }

    #[tokio::test]
    async fn uninstall_of_missing_path_is_not_an_error() {
        let dir = tempdir().unwrap();
        let host = FakeHost::new(&dir);
        let existing = host.dirs.plugin_dir.join("present.auo");
        let host = Arc::new(host.configure(|s| {
            s.existing.insert(existing.clone());
            s.installed.insert("Author.Pkg".to_string(), "1.0".to_string());
        }));
        let mut pkg = package(direct(), Vec::new());
        pkg.installer.uninstall = vec![
            UninstallStep::Delete {
                path: "{pluginsDir}/present.auo".to_string(),
            },
            UninstallStep::Delete {
                path: "{pluginsDir}/gone.auo".to_string(),
            },
        ];
        let (tx, mut rx) = aucat_events::channel();

        Installer::new(host.clone(), InstallConfig::default())
            .uninstall(&pkg, RunOptions::new().with_event_sender(tx))
            .await
            .unwrap();

        let mut removed = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let AppEvent::Uninstall(UninstallEvent::PathRemoved { existed, .. }) = message.event {
                removed.push(existed);
            }
        }
        assert_eq!(removed, vec![true, false]);
        assert_eq!(host.count("record_removed Author.Pkg"), 1);
        assert!(host.state.lock().unwrap().installed.is_empty());
    }

    #[tokio::test]
    async fn store_login_retries_exactly_once() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.auth_refusals = 2));
        let auth = Arc::new(FakeAuth::default());
        let pkg = package(
            SourceSpec::Booth("https://booth.pm/downloadables/1".to_string()),
            vec![InstallStep::Download],
        );

        let err = Installer::new(host.clone(), InstallConfig::default())
            .with_auth_surface(auth.clone())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        let (_, _, action, cause) = step_failure(&err);
        assert_eq!(action, "download");
        assert!(matches!(cause, InstallError::AuthRequired { .. }));
        assert_eq!(host.state.lock().unwrap().auth_attempts, 2);
        assert_eq!(auth.opened.load(Ordering::SeqCst), 1);
        assert_eq!(auth.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_login_then_retry_succeeds() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.auth_refusals = 1));
        let auth = Arc::new(FakeAuth::default());
        let pkg = package(
            SourceSpec::Booth("https://booth.pm/downloadables/1".to_string()),
            vec![InstallStep::Download, InstallStep::Extract { from: None, to: None }],
        );

        Installer::new(host.clone(), InstallConfig::default())
            .with_auth_surface(auth.clone())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(host.state.lock().unwrap().auth_attempts, 2);
        assert_eq!(auth.opened.load(Ordering::SeqCst), 1);
        assert!(host.calls().iter().any(|c| c.starts_with("extract") && c.contains("booth.zip")));
    }

    #[tokio::test]
    async fn store_retry_does_not_move_progress_backwards() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| {
            s.auth_refusals = 1;
            s.transfer_reports = vec![(60, Some(100)), (90, Some(100))];
        }));
        let pkg = package(
            SourceSpec::Booth("https://booth.pm/downloadables/1".to_string()),
            vec![InstallStep::Download, copy("{tmp}/*", "{pluginsDir}")],
        );
        let (callback, seen) = recorder();

        Installer::new(host.clone(), InstallConfig::default())
            .with_auth_surface(Arc::new(FakeAuth::default()))
            .install(&pkg, RunOptions::new().with_progress(callback))
            .await
            .unwrap();

        let ratios: Vec<f64> = seen.lock().unwrap().iter().map(|p| p.ratio).collect();
        assert!(ratios.windows(2).all(|w| w[0] <= w[1]), "{ratios:?}");
        assert!(ratios.iter().any(|r| (r - 0.45).abs() < 1e-9));
    }

    #[tokio::test]
    async fn store_refusal_without_surface_fails_immediately() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.auth_refusals = 1));
        let pkg = package(
            SourceSpec::Booth("https://booth.pm/downloadables/1".to_string()),
            vec![InstallStep::Download],
        );

        let err = Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(step_failure(&err).3, InstallError::AuthRequired { .. }));
        assert_eq!(host.state.lock().unwrap().auth_attempts, 1);
    }

    #[tokio::test]
    async fn running_host_app_blocks_every_step() {
        let dir = tempdir().unwrap();
        let mut host = FakeHost::new(&dir);
        host.running = Some(true);
        let host = Arc::new(host);
        let pkg = package(direct(), vec![InstallStep::Download]);

        let err = Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Install(InstallError::PreconditionFailed { .. })
        ));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_host_app_state_is_a_precondition_failure() {
        let dir = tempdir().unwrap();
        let mut host = FakeHost::new(&dir);
        host.running = None;
        let pkg = package(direct(), vec![InstallStep::Download]);

        let err = Installer::new(Arc::new(host), InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .contains("could not determine whether the host application is running"));
    }

    #[tokio::test]
    async fn held_lock_fails_before_any_step() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let lock = host.dirs.config_path("installer.lock");
        std::fs::create_dir_all(lock.parent().unwrap()).unwrap();
        std::fs::write(&lock, std::process::id().to_string()).unwrap();
        let pkg = package(direct(), vec![InstallStep::Download]);

        let err = Installer::new(host.clone(), InstallConfig::default().with_lock_file(true))
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Install(InstallError::LockHeld { .. })));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn lock_is_released_after_the_run() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let pkg = package(direct(), vec![InstallStep::Download]);
        let installer =
            Installer::new(host.clone(), InstallConfig::default().with_lock_file(true));

        installer.install(&pkg, RunOptions::new()).await.unwrap();
        installer.install(&pkg, RunOptions::new()).await.unwrap();
        assert!(!host.dirs.config_path("installer.lock").exists());
    }

    #[tokio::test]
    async fn unsupported_action_fails_at_its_position() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let pkg = package(
            direct(),
            vec![
                InstallStep::Download,
                InstallStep::Unsupported {
                    action: "reboot".to_string(),
                },
            ],
        );

        let err = Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        let (index, total, action, cause) = step_failure(&err);
        assert_eq!((index, total, action.as_str()), (2, 2, "reboot"));
        assert!(matches!(cause, InstallError::UnsupportedAction { .. }));
        assert_eq!(host.count("download"), 1);
    }

    #[tokio::test]
    async fn download_placeholder_requires_a_prior_download() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let pkg = package(direct(), vec![copy("{download}", "{pluginsDir}")]);

        let err = Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(step_failure(&err).3, InstallError::DownloadNotReady));
        assert_eq!(host.count("copy"), 0);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.run_exit_code = 3));
        let pkg = package(direct(), vec![run("{appDir}/tool.exe")]);

        let err = Installer::new(host, InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();

        match step_failure(&err).3 {
            InstallError::ProcessFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected cause: {other:?}"),
        }
    }

    #[tokio::test]
    async fn extraction_failure_is_lenient_unless_strict() {
        let dir = tempdir().unwrap();
        let pkg = package(
            direct(),
            vec![InstallStep::Download, InstallStep::Extract { from: None, to: None }],
        );

        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.extract_fails = true));
        Installer::new(host, InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap();

        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.extract_fails = true));
        let err = Installer::new(host, InstallConfig::default().with_strict_extract(true))
            .install(&pkg, RunOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(
            step_failure(&err).3,
            InstallError::ExtractionFailed { .. }
        ));
    }

    #[tokio::test]
    async fn cancelled_token_runs_no_step() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let pkg = package(direct(), vec![InstallStep::Download]);
        let token = CancellationToken::new();
        token.cancel();

        let err = Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new().with_cancel(token))
            .await
            .unwrap_err();

        assert!(matches!(step_failure(&err).3, InstallError::Cancelled));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hanging_step() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.download_hangs = true));
        let pkg = package(direct(), vec![InstallStep::Download, run("{tmp}/x.exe")]);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new().with_cancel(token))
            .await
            .unwrap_err();

        assert!(matches!(step_failure(&err).3, InstallError::Cancelled));
        assert_eq!(host.count("run"), 0);
    }

    #[tokio::test]
    async fn step_timeout_bounds_a_hanging_step() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir).configure(|s| s.download_hangs = true));
        let pkg = package(direct(), vec![InstallStep::Download]);

        let err = Installer::new(
            host,
            InstallConfig::default().with_step_timeout(Duration::from_millis(50)),
        )
        .install(&pkg, RunOptions::new())
        .await
        .unwrap_err();

        assert!(matches!(
            step_failure(&err).3,
            InstallError::StepTimeout { .. }
        ));
    }

    #[tokio::test]
    async fn state_sink_receives_the_detected_version() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let pkg = package(SourceSpec::GoogleDrive { id: "file-1".to_string() }, vec![
            InstallStep::Download,
        ]);
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink_published = Arc::clone(&published);
        let sink: StateSink = Arc::new(move |id: &str, version: &str| {
            sink_published
                .lock()
                .unwrap()
                .push((id.to_string(), version.to_string()));
        });

        Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new().with_state_sink(sink))
            .await
            .unwrap();

        assert_eq!(
            *published.lock().unwrap(),
            vec![("Author.Pkg".to_string(), "1.0".to_string())]
        );
        assert_eq!(host.count("drive file-1"), 1);
    }

    #[tokio::test]
    async fn github_source_resolves_through_the_host() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let pkg = package(
            SourceSpec::GitHub {
                owner: "o".to_string(),
                repo: "r".to_string(),
                pattern: Some(r"\.zip$".to_string()),
                tag: None,
            },
            vec![InstallStep::Download],
        );

        Installer::new(host.clone(), InstallConfig::default())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(
            host.calls()[..2],
            [
                "github o/r".to_string(),
                "download https://github.com/o/r/releases/download/v1/a.zip".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn surface_is_closed_even_when_never_opened() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let auth = Arc::new(FakeAuth::default());
        let pkg = package(direct(), vec![InstallStep::Download]);

        Installer::new(host, InstallConfig::default())
            .with_auth_surface(auth.clone())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap();

        assert_eq!(auth.opened.load(Ordering::SeqCst), 0);
        assert_eq!(auth.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keep_tmp_leaves_the_run_directory() {
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let pkg = package(direct(), vec![InstallStep::Download]);

        Installer::new(host.clone(), InstallConfig::default().with_keep_tmp(true))
            .install(&pkg, RunOptions::new())
            .await
            .unwrap();

        assert!(host.dirs.installer_tmp_root().join("Author.Pkg-1.0").is_dir());
    }

    #[tokio::test]
    async fn undeliverable_telemetry_never_fails_the_run() {
        use aucat_config::TelemetryConfig;
        use aucat_net::{NetClient, NetConfig};
        use aucat_state::PackageStateReporter;
        use httpmock::prelude::*;

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/events");
            then.status(500);
        });
        let dir = tempdir().unwrap();
        let host = Arc::new(FakeHost::new(&dir));
        let client = NetClient::new(NetConfig {
            allow_http: true,
            retry_count: 0,
            retry_delay: Duration::from_millis(1),
            ..NetConfig::default()
        })
        .unwrap();
        let telemetry = Arc::new(PackageStateReporter::new(
            &host.dirs.config_dir,
            &TelemetryConfig {
                endpoint: server.url("/events"),
                ..TelemetryConfig::default()
            },
            client,
            "0.1.0",
        ));
        let pkg = package(direct(), vec![InstallStep::Download]);

        Installer::new(host, InstallConfig::default())
            .with_telemetry(telemetry.clone())
            .install(&pkg, RunOptions::new())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(telemetry.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn local_host_detects_versions_from_file_hashes() {
        use aucat_net::{NetClient, NetConfig};
        use aucat_state::file_xxh3_128_hex;
        use aucat_types::{VersionEntry, VersionFile};

        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let dirs = AppDirs::from_parts(root.clone(), root.join("data"), root.join("config"), true);
        let plugin = dirs.plugin_dir.join("a.aui2");
        std::fs::create_dir_all(plugin.parent().unwrap()).unwrap();
        std::fs::write(&plugin, b"release 1.1").unwrap();
        let current = file_xxh3_128_hex(&plugin).await.unwrap();

        let host = LocalHost::new(
            NetClient::new(NetConfig::default()).unwrap(),
            dirs,
            "aviutl2.exe".to_string(),
        );
        let hashed = |id: &str, versions: &[(&str, &str, &str)]| {
            let mut pkg = package(direct(), Vec::new());
            pkg.id = id.to_string();
            pkg.versions = versions
                .iter()
                .map(|(version, path, hash)| VersionEntry {
                    version: (*version).to_string(),
                    file: vec![VersionFile {
                        path: (*path).to_string(),
                        hash: (*hash).to_string(),
                    }],
                })
                .collect();
            pkg
        };
        let matching = hashed(
            "Match.Pkg",
            &[
                ("1.0", "{pluginsDir}/a.aui2", "00000000000000000000000000000000"),
                ("1.1", "{pluginsDir}/a.aui2", current.as_str()),
            ],
        );
        let mismatching = hashed(
            "Changed.Pkg",
            &[("2.0", "{pluginsDir}/a.aui2", "ffffffffffffffffffffffffffffffff")],
        );
        let missing = hashed("Gone.Pkg", &[("3.0", "{scriptsDir}/gone.lua", current.as_str())]);
        let mut recorded = package(direct(), Vec::new());
        recorded.id = "Plain.Pkg".to_string();
        host.record_installed("Plain.Pkg", Some("0.9")).await.unwrap();

        let versions = host
            .query_installed_versions(&[matching, mismatching, missing, recorded])
            .await
            .unwrap();

        assert_eq!(versions["Match.Pkg"], "1.1");
        assert_eq!(versions["Changed.Pkg"], UNKNOWN_VERSION);
        assert_eq!(versions["Gone.Pkg"], "");
        assert_eq!(versions["Plain.Pkg"], "0.9");
        assert!(root.join("config/hash-cache.json").is_file());
    }
}
