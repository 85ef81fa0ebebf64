//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields so
//! the JSON log file carries the same information the console shows.

use aucat_events::{
    AppEvent, AuthEvent, DownloadEvent, EventMessage, GeneralEvent, InstallEvent, UninstallEvent,
};
use tracing::{debug, error, info, warn};

/// Log an [`EventMessage`] at its level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let correlation = meta.correlation_id.as_deref();

    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(source, correlation, context = ?context, "{message}");
            }
            GeneralEvent::DebugLog { message } => {
                debug!(source, correlation, "{message}");
            }
        },

        AppEvent::Download(event) => match event {
            DownloadEvent::Started {
                task_id,
                url,
                total_bytes,
            } => {
                info!(source, correlation, %task_id, url = %url, total_bytes = ?total_bytes, "Download started");
            }
            DownloadEvent::Progress {
                task_id,
                read,
                total,
            } => {
                debug!(source, %task_id, read, total = ?total, "Download progress");
            }
            DownloadEvent::Completed {
                task_id,
                url,
                path,
                bytes_downloaded,
            } => {
                info!(
                    source,
                    correlation,
                    %task_id,
                    url = %url,
                    path = %path.display(),
                    bytes_downloaded,
                    "Download completed"
                );
            }
            DownloadEvent::Failed {
                task_id,
                url,
                failure,
            } => {
                error!(
                    source,
                    correlation,
                    %task_id,
                    url = %url,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    "Download failed"
                );
            }
            DownloadEvent::Retrying {
                url,
                attempt,
                max_attempts,
                reason,
            } => {
                warn!(source, url = %url, attempt, max_attempts, reason = %reason, "Retrying download");
            }
        },

        AppEvent::Install(event) => match event {
            InstallEvent::Started {
                package,
                version,
                steps,
            } => {
                info!(source, correlation, package = %package, version = %version, steps, "Install started");
            }
            InstallEvent::StepStarted {
                package,
                index,
                total,
                action,
            } => {
                debug!(source, package = %package, step = index, total, action = %action, "Step started");
            }
            InstallEvent::StepCompleted {
                package,
                index,
                total,
                action,
            } => {
                debug!(source, package = %package, step = index, total, action = %action, "Step completed");
            }
            InstallEvent::SourceResolved {
                package,
                kind,
                location,
            } => {
                info!(source, package = %package, kind = %kind, location = %location, "Source resolved");
            }
            InstallEvent::Completed { package, version } => {
                info!(source, correlation, package = %package, version = %version, "Install completed");
            }
            InstallEvent::Failed {
                package,
                version,
                failure,
            } => {
                error!(
                    source,
                    correlation,
                    package = %package,
                    version = %version,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Install failed"
                );
            }
        },

        AppEvent::Uninstall(event) => match event {
            UninstallEvent::Started { package, steps } => {
                info!(source, correlation, package = %package, steps, "Uninstall started");
            }
            UninstallEvent::PathRemoved {
                package,
                path,
                existed,
            } => {
                info!(source, package = %package, path = %path, existed, "Path removed");
            }
            UninstallEvent::Completed { package } => {
                info!(source, correlation, package = %package, "Uninstall completed");
            }
            UninstallEvent::Failed { package, failure } => {
                error!(
                    source,
                    correlation,
                    package = %package,
                    code = ?failure.code,
                    message = %failure.message,
                    "Uninstall failed"
                );
            }
        },

        AppEvent::Progress(progress) => {
            debug!(
                source,
                correlation,
                ratio = progress.ratio,
                step = ?progress.step,
                phase = ?progress.phase,
                label = %progress.label,
                "Progress"
            );
        }

        AppEvent::Auth(event) => match event {
            AuthEvent::LoginRequired { url } => info!(source, url = %url, "Login required"),
            AuthEvent::LoginCompleted { url } => info!(source, url = %url, "Login completed"),
            AuthEvent::LoginRejected { url } => warn!(source, url = %url, "Login rejected"),
            AuthEvent::SurfaceClosed => debug!(source, "Login surface closed"),
        },
    }
}
