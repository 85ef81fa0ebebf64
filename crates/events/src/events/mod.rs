use serde::{Deserialize, Serialize};

use crate::{EventSource, ProgressEvent, ProgressPhase};
use aucat_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code, when the error defines one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod auth;
pub mod download;
pub mod general;
pub mod install;
pub mod uninstall;

pub use auth::*;
pub use download::*;
pub use general::*;
pub use install::*;
pub use uninstall::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Transfer lifecycle and byte progress
    Download(DownloadEvent),

    Install(InstallEvent),

    Uninstall(UninstallEvent),

    /// Aggregated run progress as delivered to progress callbacks
    Progress(ProgressEvent),

    /// Storefront login flow
    Auth(AuthEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Download(_) => EventSource::DOWNLOAD,
            Self::Install(_) => EventSource::INSTALL,
            Self::Uninstall(_) => EventSource::UNINSTALL,
            Self::Progress(_) => EventSource::PROGRESS,
            Self::Auth(_) => EventSource::AUTH,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::Download(DownloadEvent::Failed { .. })
            | Self::Install(InstallEvent::Failed { .. })
            | Self::Uninstall(UninstallEvent::Failed { .. }) => Level::ERROR,

            Self::Progress(progress) if progress.phase == ProgressPhase::Error => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Download(DownloadEvent::Retrying { .. })
            | Self::Auth(AuthEvent::LoginRejected { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Download(DownloadEvent::Progress { .. })
            | Self::Progress(_) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "aucat::events::general",
            Self::Download(_) => "aucat::events::download",
            Self::Install(_) => "aucat::events::install",
            Self::Uninstall(_) => "aucat::events::uninstall",
            Self::Progress(_) => "aucat::events::progress",
            Self::Auth(_) => "aucat::events::auth",
        }
    }
}
