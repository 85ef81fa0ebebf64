//! Storefront login flow
//!
//! A cookie-authenticated download may be refused until the user logs in
//! through an auxiliary surface. The flow allows exactly one
//! login-and-retry cycle per transfer:
//!
//! ```text
//! Unauthenticated --refused--> AwaitingLogin --login done--> retry
//!        ^                                                     |
//!        +------------- refused again: AuthRequired <----------+
//!                       accepted: Authenticated
//! ```

use crate::host::Host;
use async_trait::async_trait;
use aucat_errors::{Error, InstallError};
use aucat_events::{AppEvent, AuthEvent, EventEmitter, EventSender};
use aucat_net::Transfer;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Interactive login surface for the storefront.
#[async_trait]
pub trait AuthSurface: Send + Sync {
    /// Future resolving once the user has completed a login.
    ///
    /// Obtaining the future subscribes to the completion signal, so it is
    /// requested before the surface is opened.
    fn wait_login_complete(&self) -> BoxFuture<'static, Result<(), Error>>;

    /// Show the login surface for `url`.
    async fn open(&self, url: &str) -> Result<(), Error>;

    /// Hide the surface. Called at the end of every run, opened or not.
    async fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingLogin,
    Authenticated,
}

/// Per-run controller for authenticated downloads.
pub struct AuthFlow {
    surface: Option<Arc<dyn AuthSurface>>,
    state: AuthState,
    events: Option<EventSender>,
}

impl EventEmitter for AuthFlow {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl AuthFlow {
    #[must_use]
    pub fn new(surface: Option<Arc<dyn AuthSurface>>, events: Option<EventSender>) -> Self {
        Self {
            surface,
            state: AuthState::Unauthenticated,
            events,
        }
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Download `url`, running one login cycle if the first attempt is
    /// refused.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::AuthRequired` when the retry is refused too or
    /// no login surface is available; other transfer errors pass through.
    pub async fn download(
        &mut self,
        host: &dyn Host,
        url: &str,
        dest_dir: &Path,
        transfer: &Transfer,
    ) -> Result<PathBuf, Error> {
        match host.download_authenticated(url, dest_dir, transfer).await {
            Ok(path) => {
                self.state = AuthState::Authenticated;
                return Ok(path);
            }
            Err(e) if e.is_auth_required() => {
                tracing::info!(url, "store login required");
            }
            Err(e) => return Err(e),
        }

        let Some(surface) = self.surface.clone() else {
            return Err(InstallError::AuthRequired {
                url: url.to_string(),
            }
            .into());
        };

        self.state = AuthState::AwaitingLogin;
        self.emit(AppEvent::Auth(AuthEvent::LoginRequired {
            url: url.to_string(),
        }));
        let login = surface.wait_login_complete();
        surface.open(url).await?;
        login.await?;
        self.emit(AppEvent::Auth(AuthEvent::LoginCompleted {
            url: url.to_string(),
        }));

        match host.download_authenticated(url, dest_dir, transfer).await {
            Ok(path) => {
                self.state = AuthState::Authenticated;
                Ok(path)
            }
            Err(e) if e.is_auth_required() => {
                self.state = AuthState::Unauthenticated;
                self.emit(AppEvent::Auth(AuthEvent::LoginRejected {
                    url: url.to_string(),
                }));
                Err(InstallError::AuthRequired {
                    url: url.to_string(),
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    /// Close the login surface if one is configured.
    pub async fn close(&self) {
        if let Some(surface) = &self.surface {
            surface.close().await;
            self.emit(AppEvent::Auth(AuthEvent::SurfaceClosed));
        }
    }
}
