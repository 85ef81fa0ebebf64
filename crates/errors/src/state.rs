//! Persistent state error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StateError {
    #[error("state file corrupted: {path}: {message}")]
    StateCorrupted { path: String, message: String },

    #[error("failed to persist {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("telemetry delivery failed: {message}")]
    DeliveryFailed { message: String },
}

impl UserFacingError for StateError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::StateCorrupted { .. } => {
                Some("Remove the damaged file; it is rebuilt on the next run.")
            }
            Self::WriteFailed { .. } => Some("Ensure the config directory is writable."),
            Self::DeliveryFailed { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::StateCorrupted { .. } => "state.corrupted",
            Self::WriteFailed { .. } => "state.write_failed",
            Self::DeliveryFailed { .. } => "state.delivery_failed",
        })
    }
}
