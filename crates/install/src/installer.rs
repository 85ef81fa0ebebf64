//! Install and uninstall drivers
//!
//! A run is strictly sequential: gate, temp directory, then each step in
//! catalog order with the [`ExecutionContext`] folded from step outputs.
//! The first failing step ends the run with positional context attached.

use crate::auth::{AuthFlow, AuthSurface};
use crate::context::{prepare_tmp_dir, remove_tmp_dir, ExecutionContext, StepOutput};
use crate::gate::check_preconditions;
use crate::host::Host;
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::steps::StepRunner;
use aucat_config::constants::LOCK_FILE;
use aucat_config::Config;
use aucat_errors::{Error, InstallError};
use aucat_events::{
    AppEvent, EventEmitter, EventSender, FailureContext, InstallEvent, ProgressPhase,
    UninstallEvent,
};
use aucat_state::{EventKind, PackageStateReporter};
use aucat_types::{InstallStep, PackageDescriptor, UninstallStep};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Receives `(package_id, detected_version)` after a successful run.
///
/// The version is empty when the package is no longer installed.
pub type StateSink = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Engine settings shared by every run of one [`Installer`].
#[derive(Debug, Clone, Default)]
pub struct InstallConfig {
    pub step_timeout: Option<Duration>,
    pub strict_extract: bool,
    pub lock_file: bool,
    pub keep_tmp: bool,
}

impl InstallConfig {
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_strict_extract(mut self, strict: bool) -> Self {
        self.strict_extract = strict;
        self
    }

    #[must_use]
    pub fn with_lock_file(mut self, lock_file: bool) -> Self {
        self.lock_file = lock_file;
        self
    }

    #[must_use]
    pub fn with_keep_tmp(mut self, keep: bool) -> Self {
        self.keep_tmp = keep;
        self
    }
}

impl From<&Config> for InstallConfig {
    fn from(config: &Config) -> Self {
        Self {
            step_timeout: (config.installer.step_timeout > 0)
                .then(|| Duration::from_secs(config.installer.step_timeout)),
            strict_extract: config.installer.strict_extract,
            lock_file: config.installer.lock_file,
            keep_tmp: config.general.dev_mode,
        }
    }
}

/// Per-call options for [`Installer::install`] and [`Installer::uninstall`].
pub struct RunOptions {
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    state_sink: Option<StateSink>,
    event_sender: Option<EventSender>,
}

options_builder! {
    RunOptions {
        cancel: CancellationToken,
    }
    optional {
        progress: ProgressCallback,
        state_sink: StateSink,
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .field("state_sink", &self.state_sink.is_some())
            .field("event_sender", &self.event_sender.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Install,
    Uninstall,
}

impl RunKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Install => "installer",
            Self::Uninstall => "uninstall",
        }
    }
}

#[derive(Clone, Copy)]
enum StepRef<'s> {
    Install(&'s InstallStep),
    Uninstall(&'s UninstallStep),
}

impl StepRef<'_> {
    fn action(&self) -> &str {
        match self {
            Self::Install(step) => step.action(),
            Self::Uninstall(step) => step.action(),
        }
    }

    async fn execute(
        self,
        runner: &mut StepRunner<'_>,
        index: usize,
        context: &ExecutionContext,
    ) -> Result<StepOutput, Error> {
        match self {
            Self::Install(step) => runner.install_step(step, index, context).await,
            Self::Uninstall(step) => runner.uninstall_step(step, context).await,
        }
    }
}

/// Event emitter scoped to one package.
struct RunEvents {
    sender: Option<EventSender>,
    package: String,
}

impl EventEmitter for RunEvents {
    fn event_sender(&self) -> Option<&EventSender> {
        self.sender.as_ref()
    }

    fn correlation_id(&self) -> Option<&str> {
        Some(&self.package)
    }
}

/// The package execution engine.
pub struct Installer {
    host: Arc<dyn Host>,
    config: InstallConfig,
    telemetry: Option<Arc<PackageStateReporter>>,
    auth_surface: Option<Arc<dyn AuthSurface>>,
}

impl Installer {
    #[must_use]
    pub fn new(host: Arc<dyn Host>, config: InstallConfig) -> Self {
        Self {
            host,
            config,
            telemetry: None,
            auth_surface: None,
        }
    }

    #[must_use]
    pub fn with_telemetry(mut self, reporter: Arc<PackageStateReporter>) -> Self {
        self.telemetry = Some(reporter);
        self
    }

    #[must_use]
    pub fn with_auth_surface(mut self, surface: Arc<dyn AuthSurface>) -> Self {
        self.auth_surface = Some(surface);
        self
    }

    #[must_use]
    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Install `package` by running its install steps in order.
    ///
    /// # Errors
    ///
    /// `PreconditionFailed` or `LockHeld` before any step runs; otherwise
    /// `StepFailed` wrapping the first step failure, or the error of
    /// recording the installed version.
    pub async fn install(&self, package: &PackageDescriptor, options: RunOptions) -> Result<(), Error> {
        let steps = package
            .installer
            .install
            .iter()
            .map(StepRef::Install)
            .collect::<Vec<_>>();
        self.drive(RunKind::Install, package, &steps, options).await
    }

    /// Uninstall `package` by running its uninstall steps in order.
    ///
    /// # Errors
    ///
    /// Same as [`Installer::install`].
    pub async fn uninstall(
        &self,
        package: &PackageDescriptor,
        options: RunOptions,
    ) -> Result<(), Error> {
        let steps = package
            .installer
            .uninstall
            .iter()
            .map(StepRef::Uninstall)
            .collect::<Vec<_>>();
        self.drive(RunKind::Uninstall, package, &steps, options).await
    }

    async fn drive(
        &self,
        kind: RunKind,
        package: &PackageDescriptor,
        steps: &[StepRef<'_>],
        options: RunOptions,
    ) -> Result<(), Error> {
        let events = RunEvents {
            sender: options.event_sender.clone(),
            package: package.id.clone(),
        };

        let result = self.run(kind, package, steps, &options, &events).await;
        if let Err(e) = &result {
            let failure = FailureContext::from_error(e);
            events.emit(match kind {
                RunKind::Install => AppEvent::Install(InstallEvent::Failed {
                    package: package.id.clone(),
                    version: package.version_or_latest().to_string(),
                    failure,
                }),
                RunKind::Uninstall => AppEvent::Uninstall(UninstallEvent::Failed {
                    package: package.id.clone(),
                    failure,
                }),
            });
        }
        result
    }

    #[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
    async fn run(
        &self,
        kind: RunKind,
        package: &PackageDescriptor,
        steps: &[StepRef<'_>],
        options: &RunOptions,
        events: &RunEvents,
    ) -> Result<(), Error> {
        let host = self.host.as_ref();
        let dirs = host.app_dirs()?;
        let lock_path = self.config.lock_file.then(|| dirs.config_path(LOCK_FILE));
        let _lock = check_preconditions(host, lock_path.as_deref()).await?;

        let tmp_dir = prepare_tmp_dir(&dirs, &package.temp_key()).await?;
        let total = steps.len();
        let progress = ProgressReporter::new(
            total,
            options.progress.clone(),
            options.event_sender.clone(),
            package.id.clone(),
        );
        progress.report(0.0, None, None, ProgressPhase::Init);

        tracing::info!(
            package = %package.id,
            version = package.version_or_latest(),
            steps = total,
            "[{} {}] starting",
            kind.prefix(),
            package.id
        );
        events.emit(match kind {
            RunKind::Install => AppEvent::Install(InstallEvent::Started {
                package: package.id.clone(),
                version: package.version_or_latest().to_string(),
                steps: total,
            }),
            RunKind::Uninstall => AppEvent::Uninstall(UninstallEvent::Started {
                package: package.id.clone(),
                steps: total,
            }),
        });

        let auth = AuthFlow::new(self.auth_surface.clone(), options.event_sender.clone());
        let mut runner = StepRunner::new(
            host,
            &dirs,
            package,
            auth,
            progress.clone(),
            options.event_sender.clone(),
        )
        .with_strict_extract(self.config.strict_extract);

        let mut context = ExecutionContext::new(tmp_dir.clone());
        let mut outcome = Ok(());
        for (idx, step) in steps.iter().copied().enumerate() {
            let action = step.action().to_string();
            progress.report(idx as f64, Some(&action), Some(idx), ProgressPhase::Running);
            if kind == RunKind::Install {
                events.emit(AppEvent::Install(InstallEvent::StepStarted {
                    package: package.id.clone(),
                    index: idx + 1,
                    total,
                    action: action.clone(),
                }));
            }
            tracing::info!(package = %package.id, step = idx + 1, action = %action, "step {}/{total}", idx + 1);

            let result = self
                .guard(step.execute(&mut runner, idx, &context), &options.cancel)
                .await;
            match result {
                Ok(output) => {
                    context = context.apply(output);
                    progress.report(
                        (idx + 1) as f64,
                        Some(&action),
                        Some(idx),
                        ProgressPhase::StepComplete,
                    );
                    if kind == RunKind::Install {
                        events.emit(AppEvent::Install(InstallEvent::StepCompleted {
                            package: package.id.clone(),
                            index: idx + 1,
                            total,
                            action,
                        }));
                    }
                }
                Err(cause) => {
                    progress.report(idx as f64, Some(&action), Some(idx), ProgressPhase::Error);
                    let error: Error = InstallError::StepFailed {
                        run: kind.prefix().to_string(),
                        package: package.id.clone(),
                        index: idx + 1,
                        total,
                        action,
                        source: Box::new(cause),
                    }
                    .into();
                    tracing::error!(package = %package.id, error = %error, "step failed");
                    outcome = Err(error);
                    break;
                }
            }
        }

        runner.finish().await;
        outcome?;

        match kind {
            RunKind::Install => {
                host.record_installed(&package.id, package.latest_version.as_deref())
                    .await?;
            }
            RunKind::Uninstall => host.record_removed(&package.id).await?,
        }
        self.publish_state(package, options).await;
        self.report_telemetry(kind, package, events).await;

        events.emit(match kind {
            RunKind::Install => AppEvent::Install(InstallEvent::Completed {
                package: package.id.clone(),
                version: package.version_or_latest().to_string(),
            }),
            RunKind::Uninstall => AppEvent::Uninstall(UninstallEvent::Completed {
                package: package.id.clone(),
            }),
        });
        progress.report(total as f64, None, None, ProgressPhase::Done);
        tracing::info!(package = %package.id, "[{} {}] done", kind.prefix(), package.id);

        if self.config.keep_tmp {
            tracing::debug!(path = %tmp_dir.display(), "keeping temp dir");
        } else {
            remove_tmp_dir(&tmp_dir).await;
        }
        Ok(())
    }

    /// Run one step under the cancellation token and the step timeout.
    async fn guard<F>(&self, step: F, cancel: &CancellationToken) -> Result<StepOutput, Error>
    where
        F: Future<Output = Result<StepOutput, Error>>,
    {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled.into());
        }
        let bounded = async move {
            match self.config.step_timeout {
                Some(limit) => match tokio::time::timeout(limit, step).await {
                    Ok(result) => result,
                    Err(_) => Err(InstallError::StepTimeout {
                        seconds: limit.as_secs(),
                    }
                    .into()),
                },
                None => step.await,
            }
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(InstallError::Cancelled.into()),
            result = bounded => result,
        }
    }

    async fn publish_state(&self, package: &PackageDescriptor, options: &RunOptions) {
        let Some(sink) = &options.state_sink else {
            return;
        };
        match self
            .host
            .query_installed_versions(std::slice::from_ref(package))
            .await
        {
            Ok(versions) => {
                let version = versions.get(&package.id).map_or("", String::as_str);
                if catch_unwind(AssertUnwindSafe(|| sink(&package.id, version))).is_err() {
                    tracing::warn!(package = %package.id, "state sink panicked");
                }
            }
            Err(e) => {
                tracing::warn!(package = %package.id, error = %e, "failed to query installed version");
            }
        }
    }

    async fn report_telemetry(&self, kind: RunKind, package: &PackageDescriptor, events: &RunEvents) {
        let Some(reporter) = &self.telemetry else {
            return;
        };
        let event_kind = match kind {
            RunKind::Install => EventKind::Install,
            RunKind::Uninstall => EventKind::Uninstall,
        };
        if let Err(e) = reporter.record(event_kind, &package.id).await {
            tracing::warn!(package = %package.id, error = %e, "telemetry not delivered");
            events.emit_warning_with_context("usage event could not be recorded", e.to_string());
        }
    }
}
