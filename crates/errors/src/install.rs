//! Installer execution error types

use std::borrow::Cow;

use crate::{Error, UserFacingError};

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("{message}")]
    PreconditionFailed { message: String },

    #[error("another installer run holds the lock: {path}")]
    LockHeld { path: String },

    #[error("download source could not be resolved: {message}")]
    SourceUnresolved { message: String },

    #[error("unsupported action: {action}")]
    UnsupportedAction { action: String },

    #[error("[{run} {package}] step {index}/{total} action={action} failed: {source}")]
    StepFailed {
        run: String,
        package: String,
        index: usize,
        total: usize,
        action: String,
        #[source]
        source: Box<Error>,
    },

    #[error("login required for {url}; authentication was not completed")]
    AuthRequired { url: String },

    #[error("copy matched 0 files (from={from} to={to})")]
    CopyMatchedNothing { from: String, to: String },

    #[error("process exited with {exit_code} (exe={exe}, args={args:?}, elevate={elevate}): {stderr}")]
    ProcessFailed {
        exe: String,
        args: Vec<String>,
        elevate: bool,
        exit_code: i32,
        stderr: String,
    },

    #[error("delete failed path={path}: {message}")]
    DeleteFailed { path: String, message: String },

    #[error("{action} step requires a non-empty `{field}`")]
    MissingField { action: String, field: String },

    #[error("`{{download}}` used before any download step ran")]
    DownloadNotReady,

    #[error("extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("step timed out after {seconds}s")]
    StepTimeout { seconds: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error("temporary directory error: {message}")]
    TempDirFailed { message: String },
}

impl InstallError {
    /// The innermost cause of a wrapped step failure, or `self`.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::StepFailed { source, .. } => match source.as_ref() {
                Error::Install(inner) => inner.root_cause(),
                _ => self,
            },
            _ => self,
        }
    }
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PreconditionFailed { .. } => {
                Some("Close the host application before installing or uninstalling packages.")
            }
            Self::LockHeld { .. } => {
                Some("Wait for the other run to finish, or remove a stale installer.lock.")
            }
            Self::SourceUnresolved { .. } => {
                Some("Check the package's source settings; the release may have no matching asset.")
            }
            Self::AuthRequired { .. } => Some("Log in to the store and retry the installation."),
            Self::CopyMatchedNothing { .. } => {
                Some("The archive layout may have changed; check the package's copy pattern.")
            }
            Self::StepFailed { source, .. } => match source.as_ref() {
                Error::Install(inner) => inner.user_hint(),
                other => other.user_hint(),
            },
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::LockHeld { .. } | Self::AuthRequired { .. } | Self::StepTimeout { .. } => true,
            Self::StepFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::PreconditionFailed { .. } => "install.precondition_failed",
            Self::LockHeld { .. } => "install.lock_held",
            Self::SourceUnresolved { .. } => "install.source_unresolved",
            Self::UnsupportedAction { .. } => "install.unsupported_action",
            Self::StepFailed { .. } => "install.step_failed",
            Self::AuthRequired { .. } => "install.auth_required",
            Self::CopyMatchedNothing { .. } => "install.copy_matched_nothing",
            Self::ProcessFailed { .. } => "install.process_failed",
            Self::DeleteFailed { .. } => "install.delete_failed",
            Self::MissingField { .. } => "install.missing_field",
            Self::DownloadNotReady => "install.download_not_ready",
            Self::ExtractionFailed { .. } => "install.extraction_failed",
            Self::StepTimeout { .. } => "install.step_timeout",
            Self::Cancelled => "install.cancelled",
            Self::TempDirFailed { .. } => "install.temp_dir_failed",
        };
        Some(code)
    }
}
