//! Platform-specific operation errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Errors that can occur during platform-specific operations
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PlatformError {
    #[error("filesystem operation failed: {operation} - {message}")]
    FilesystemOperationFailed { operation: String, message: String },

    #[error("process execution failed: {command} - {message}")]
    ProcessExecutionFailed { command: String, message: String },

    #[error("platform capability not available: {capability}")]
    CapabilityUnavailable { capability: String },

    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("invalid archive: {path} - {message}")]
    InvalidArchive { path: String, message: String },

    #[error("invalid glob pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("permission denied: {operation} - {message}")]
    PermissionDenied { operation: String, message: String },
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PermissionDenied { .. } => {
                Some("Retry with elevation or check permissions on the target directory.")
            }
            Self::CommandNotFound { .. } => Some("Install the missing command and retry."),
            Self::InvalidArchive { .. } => {
                Some("The downloaded file may be incomplete; remove it and retry.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::FilesystemOperationFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::FilesystemOperationFailed { .. } => "platform.filesystem_failed",
            Self::ProcessExecutionFailed { .. } => "platform.process_failed",
            Self::CapabilityUnavailable { .. } => "platform.capability_unavailable",
            Self::CommandNotFound { .. } => "platform.command_not_found",
            Self::InvalidArchive { .. } => "platform.invalid_archive",
            Self::InvalidPattern { .. } => "platform.invalid_pattern",
            Self::PermissionDenied { .. } => "platform.permission_denied",
        };
        Some(code)
    }
}
