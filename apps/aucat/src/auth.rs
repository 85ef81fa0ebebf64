//! Console login surface
//!
//! Prints the storefront URL and waits for the user to paste the session
//! cookie of a logged-in browser. The cookie is stored for later runs.

use async_trait::async_trait;
use aucat_errors::{Error, InstallError};
use aucat_install::AuthSurface;
use futures::future::BoxFuture;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::watch;

pub struct ConsoleAuthSurface {
    session_path: PathBuf,
    completed: watch::Sender<u64>,
}

impl ConsoleAuthSurface {
    pub fn new(session_path: PathBuf) -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            session_path,
            completed,
        }
    }
}

#[async_trait]
impl AuthSurface for ConsoleAuthSurface {
    fn wait_login_complete(&self) -> BoxFuture<'static, Result<(), Error>> {
        let mut rx = self.completed.subscribe();
        Box::pin(async move {
            rx.changed()
                .await
                .map_err(|_| Error::internal("login prompt went away"))
        })
    }

    async fn open(&self, url: &str) -> Result<(), Error> {
        eprintln!();
        eprintln!("Login required to download {url}");
        eprintln!("Log in with a browser, then paste the Cookie header value and press Enter:");

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| Error::internal(format!("login prompt failed: {e}")))??;

        let cookie = line.trim();
        if cookie.is_empty() {
            return Err(InstallError::AuthRequired {
                url: url.to_string(),
            }
            .into());
        }
        aucat_net::save_session(&self.session_path, cookie).await?;
        self.completed.send_modify(|n| *n += 1);
        Ok(())
    }

    async fn close(&self) {
        tracing::debug!("login prompt closed");
    }
}
