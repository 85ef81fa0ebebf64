//! Cookie-authenticated storefront downloads
//!
//! The store hands out downloads only to logged-in sessions. The session
//! cookie is captured by a login surface and persisted in a small file; a
//! refused request means the session is missing or stale.

use aucat_errors::{Error, NetworkError};
use reqwest::header::{CONTENT_DISPOSITION, COOKIE};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};

use crate::download::{
    check_status, ensure_allowed_url, filename_from_content_disposition, filename_from_url,
    save_response, Transfer,
};
use crate::NetClient;

/// Path fragment of the store's login page; landing there means the
/// request was redirected away from the download.
const SIGN_IN_MARKER: &str = "/sign_in";

/// Load the stored session cookie, if any.
pub async fn load_session(path: &Path) -> Option<String> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    let cookie = raw.trim();
    (!cookie.is_empty()).then(|| cookie.to_string())
}

/// Persist a session cookie for later downloads.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub async fn save_session(path: &Path, cookie: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_with_path(&e, parent))?;
    }
    tokio::fs::write(path, cookie.trim())
        .await
        .map_err(|e| Error::io_with_path(&e, path))
}

/// Download a store item with the session cookie.
///
/// # Errors
///
/// `AuthWindowMissing` when no session is available, `AuthRequired` when the
/// store refuses the session, otherwise the usual transfer errors.
pub async fn booth_download(
    client: &NetClient,
    url: &str,
    dest_dir: &Path,
    session: Option<&str>,
    transfer: &Transfer,
) -> Result<PathBuf, Error> {
    let parsed = ensure_allowed_url(url, client.config().allow_http)?;
    let Some(cookie) = session else {
        return Err(NetworkError::AuthWindowMissing.into());
    };

    let response = client
        .send(|| client.inner().get(parsed.as_str()).header(COOKIE, cookie))
        .await?;

    let landed_on_login = response.url().path().contains(SIGN_IN_MARKER);
    if landed_on_login
        || matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    {
        tracing::info!(task_id = %transfer.task_id, url, status = %response.status(), "store session refused");
        return Err(NetworkError::AuthRequired {
            url: url.to_string(),
        }
        .into());
    }
    let response = check_status(response).await?;

    let name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_content_disposition)
        .unwrap_or_else(|| filename_from_url(response.url()));
    save_response(response, url, dest_dir.join(name), transfer).await
}
