//! Step executor
//!
//! One handler per action. Handlers read the current [`ExecutionContext`]
//! and return a [`StepOutput`]; they never mutate the context themselves.

use crate::auth::AuthFlow;
use crate::context::{ExecutionContext, StepOutput};
use crate::expand::expand;
use crate::host::Host;
use crate::progress::ProgressReporter;
use crate::source::{resolve_source, ResolvedSource};
use aucat_errors::{Error, InstallError};
use aucat_events::{AppEvent, EventEmitter, EventSender, InstallEvent, UninstallEvent};
use aucat_net::Transfer;
use aucat_types::{AppDirs, InstallStep, PackageDescriptor, RunSpec, StepAction, UninstallStep};
use std::path::Path;
use uuid::Uuid;

/// Everything a step handler needs for one run.
pub struct StepRunner<'a> {
    host: &'a dyn Host,
    dirs: &'a AppDirs,
    package: &'a PackageDescriptor,
    auth: AuthFlow,
    progress: ProgressReporter,
    events: Option<EventSender>,
    strict_extract: bool,
}

impl EventEmitter for StepRunner<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }

    fn correlation_id(&self) -> Option<&str> {
        Some(&self.package.id)
    }
}

impl<'a> StepRunner<'a> {
    #[must_use]
    pub fn new(
        host: &'a dyn Host,
        dirs: &'a AppDirs,
        package: &'a PackageDescriptor,
        auth: AuthFlow,
        progress: ProgressReporter,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            host,
            dirs,
            package,
            auth,
            progress,
            events,
            strict_extract: false,
        }
    }

    #[must_use]
    pub fn with_strict_extract(mut self, strict: bool) -> Self {
        self.strict_extract = strict;
        self
    }

    #[must_use]
    pub fn auth(&self) -> &AuthFlow {
        &self.auth
    }

    /// Execute one install step.
    ///
    /// # Errors
    ///
    /// Returns the unwrapped cause; positional context is added by the
    /// caller.
    pub async fn install_step(
        &mut self,
        step: &InstallStep,
        index: usize,
        context: &ExecutionContext,
    ) -> Result<StepOutput, Error> {
        match step {
            InstallStep::Download => self.download(index, context).await,
            InstallStep::Extract { from, to } => {
                self.extract(from.as_deref(), to.as_deref(), false, context)
                    .await
            }
            InstallStep::ExtractSfx { from, to } => {
                self.extract(from.as_deref(), to.as_deref(), true, context)
                    .await
            }
            InstallStep::Copy { from, to } => {
                self.copy(from.as_deref(), to.as_deref(), context).await
            }
            InstallStep::Run(spec) => self.run(spec, context).await,
            InstallStep::RunAuoSetup { path } => self.run_auo_setup(path, context).await,
            InstallStep::Unsupported { action } => Err(InstallError::UnsupportedAction {
                action: action.clone(),
            }
            .into()),
        }
    }

    /// Execute one uninstall step.
    ///
    /// # Errors
    ///
    /// Same as [`StepRunner::install_step`].
    pub async fn uninstall_step(
        &mut self,
        step: &UninstallStep,
        context: &ExecutionContext,
    ) -> Result<StepOutput, Error> {
        match step {
            UninstallStep::Delete { path } => self.delete(path, context).await,
            UninstallStep::Run(spec) => self.run(spec, context).await,
            UninstallStep::Unsupported { action } => Err(InstallError::UnsupportedAction {
                action: action.clone(),
            }
            .into()),
        }
    }

    /// Close the login surface at the end of a run.
    pub async fn finish(&self) {
        self.auth.close().await;
    }

    async fn download(
        &mut self,
        index: usize,
        context: &ExecutionContext,
    ) -> Result<StepOutput, Error> {
        let source = resolve_source(self.host, &self.package.installer.source).await?;
        self.emit(AppEvent::Install(InstallEvent::SourceResolved {
            package: self.package.id.clone(),
            kind: self.package.installer.source.kind().to_string(),
            location: source.location().to_string(),
        }));

        let task_id = Uuid::new_v4();
        let mut transfer = Transfer::new(task_id).with_progress(self.progress.transfer_sink(
            index,
            StepAction::Download.as_str(),
            task_id,
        ));
        if let Some(tx) = &self.events {
            transfer = transfer.with_events(tx.clone());
        }

        let dest = context.tmp_dir();
        tracing::info!(
            package = %self.package.id,
            location = source.location(),
            dest = %dest.display(),
            "downloading"
        );
        let path = match &source {
            ResolvedSource::Url(url) => self.host.download(url, dest, &transfer).await?,
            ResolvedSource::Authenticated(url) => {
                self.auth.download(self.host, url, dest, &transfer).await?
            }
            ResolvedSource::CloudDrive(id) => {
                self.host.cloud_drive_download(id, dest, &transfer).await?
            }
        };
        Ok(StepOutput::Downloaded(path))
    }

    async fn extract(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        sfx: bool,
        context: &ExecutionContext,
    ) -> Result<StepOutput, Error> {
        let from = match from.filter(|f| !f.is_empty()) {
            Some(from) => expand(from, self.dirs, context)?,
            None => context.require_download()?.to_string_lossy().into_owned(),
        };
        let to = expand(to.filter(|t| !t.is_empty()).unwrap_or("{tmp}"), self.dirs, context)?;

        tracing::info!(package = %self.package.id, from = %from, to = %to, sfx, "extracting");
        let result = if sfx {
            self.host.extract_sfx(Path::new(&from), Path::new(&to)).await
        } else {
            self.host.extract_archive(Path::new(&from), Path::new(&to)).await
        };

        match result {
            Ok(()) => Ok(StepOutput::Unchanged),
            Err(e) if self.strict_extract => Err(InstallError::ExtractionFailed {
                message: e.to_string(),
            }
            .into()),
            Err(e) => {
                tracing::warn!(package = %self.package.id, from = %from, error = %e, "extraction failed; continuing");
                self.emit_warning_with_context(
                    format!("extraction of {from} failed"),
                    e.to_string(),
                );
                Ok(StepOutput::Unchanged)
            }
        }
    }

    async fn copy(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        context: &ExecutionContext,
    ) -> Result<StepOutput, Error> {
        let from = required(StepAction::Copy, "from", from)?;
        let to = required(StepAction::Copy, "to", to)?;
        let from = expand(from, self.dirs, context)?;
        let to = expand(to, self.dirs, context)?;

        let count = self
            .host
            .copy_by_pattern(Path::new(&from), Path::new(&to))
            .await?;
        tracing::info!(package = %self.package.id, "copy matched {count} files (from={from} to={to})");
        self.emit_debug(format!("copy matched {count} files ({from} -> {to})"));
        if count == 0 {
            return Err(InstallError::CopyMatchedNothing { from, to }.into());
        }
        Ok(StepOutput::Unchanged)
    }

    async fn run(&self, spec: &RunSpec, context: &ExecutionContext) -> Result<StepOutput, Error> {
        let exe = expand(required(StepAction::Run, "path", Some(spec.path.as_str()))?, self.dirs, context)?;
        let args = spec
            .args
            .iter()
            .map(|a| expand(a, self.dirs, context))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(package = %self.package.id, exe = %exe, ?args, elevate = spec.elevate, "running");
        let output = self
            .host
            .run_hidden(Path::new(&exe), &args, spec.elevate)
            .await?;
        if !output.success() {
            return Err(InstallError::ProcessFailed {
                exe,
                args,
                elevate: spec.elevate,
                exit_code: output.exit_code,
                stderr: output.stderr_snippet(),
            }
            .into());
        }
        Ok(StepOutput::Unchanged)
    }

    async fn run_auo_setup(
        &self,
        path: &str,
        context: &ExecutionContext,
    ) -> Result<StepOutput, Error> {
        let exe = expand(
            required(StepAction::RunAuoSetup, "path", Some(path))?,
            self.dirs,
            context,
        )?;
        let output = self.host.run_special_setup(Path::new(&exe)).await?;
        if !output.success() {
            return Err(InstallError::ProcessFailed {
                exe,
                args: Vec::new(),
                elevate: false,
                exit_code: output.exit_code,
                stderr: output.stderr_snippet(),
            }
            .into());
        }
        Ok(StepOutput::Unchanged)
    }

    async fn delete(&self, path: &str, context: &ExecutionContext) -> Result<StepOutput, Error> {
        let target = expand(required(StepAction::Delete, "path", Some(path))?, self.dirs, context)?;
        let existed = match self.host.delete(Path::new(&target)).await {
            Ok(existed) => existed,
            Err(Error::Install(InstallError::DeleteFailed { path, message })) => {
                return Err(InstallError::DeleteFailed { path, message }.into());
            }
            Err(e) => {
                return Err(InstallError::DeleteFailed {
                    path: target,
                    message: e.to_string(),
                }
                .into());
            }
        };

        if existed {
            tracing::info!(package = %self.package.id, "delete ok path=\"{target}\"");
        } else {
            tracing::info!(package = %self.package.id, "delete skip (not found) path=\"{target}\"");
        }
        self.emit(AppEvent::Uninstall(UninstallEvent::PathRemoved {
            package: self.package.id.clone(),
            path: target,
            existed,
        }));
        Ok(StepOutput::Unchanged)
    }
}

fn required<'s>(action: StepAction, field: &str, value: Option<&'s str>) -> Result<&'s str, InstallError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| InstallError::MissingField {
            action: action.as_str().to_string(),
            field: field.to_string(),
        })
}
