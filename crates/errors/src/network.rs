//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("only https downloads are allowed: {url}")]
    InsecureUrl { url: String },

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("SSL/TLS error: {0}")]
    TlsError(String),

    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },

    #[error("authentication required for {url}")]
    AuthRequired { url: String },

    #[error("no login session available")]
    AuthWindowMissing,

    #[error("unexpected API response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::ConnectionRefused(_) | Self::NetworkUnavailable => {
                Some("Check your network connection and retry.")
            }
            Self::InsecureUrl { .. } => {
                Some("Use an https:// URL, or set network.allow_http for local testing.")
            }
            Self::RateLimited { .. } => Some("Wait a moment before retrying the request."),
            Self::AuthRequired { .. } | Self::AuthWindowMissing => {
                Some("Log in to the store so the session cookie can be reused.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::DownloadFailed(_)
                | Self::ConnectionRefused(_)
                | Self::NetworkUnavailable
                | Self::RateLimited { .. }
        ) || matches!(self, Self::HttpError { status, .. } if *status >= 500)
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Timeout { .. } => "network.timeout",
            Self::DownloadFailed(_) => "network.download_failed",
            Self::ConnectionRefused(_) => "network.connection_refused",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::InsecureUrl { .. } => "network.insecure_url",
            Self::HttpError { .. } => "network.http_error",
            Self::TlsError(_) => "network.tls_error",
            Self::NetworkUnavailable => "network.unavailable",
            Self::RateLimited { .. } => "network.rate_limited",
            Self::AuthRequired { .. } => "network.auth_required",
            Self::AuthWindowMissing => "network.auth_window_missing",
            Self::InvalidResponse { .. } => "network.invalid_response",
        };
        Some(code)
    }
}
