//! Google Drive file downloads

use aucat_errors::{Error, NetworkError};
use reqwest::Response;
use std::path::{Path, PathBuf};
use url::Url;

use crate::download::{sanitize_filename, save_response, Transfer};
use crate::NetClient;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Download a Drive file into `dest_dir` under its Drive name.
///
/// # Errors
///
/// Returns `HttpError` carrying the API's error message when either the
/// metadata or the media request is refused.
pub async fn drive_download(
    client: &NetClient,
    file_id: &str,
    dest_dir: &Path,
    transfer: &Transfer,
) -> Result<PathBuf, Error> {
    let meta_url = file_url(&client.config().drive_api, file_id, ("fields", "name"))?;
    let meta = drive_get(client, meta_url.as_str()).await?;
    let text = meta
        .text()
        .await
        .map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let name = value
        .get("name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| NetworkError::InvalidResponse {
            url: meta_url.to_string(),
            message: "missing name field".to_string(),
        })?;
    let dest = dest_dir.join(sanitize_filename(name));

    let media_url = file_url(&client.config().drive_api, file_id, ("alt", "media"))?.to_string();
    let media = drive_get(client, &media_url).await?;
    save_response(media, &media_url, dest, transfer).await
}

/// `{api}/files/{file_id}?{key}={value}` with the id encoded as one path segment.
fn file_url(api: &str, file_id: &str, (key, value): (&str, &str)) -> Result<Url, Error> {
    let mut url = Url::parse(api).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| NetworkError::InvalidUrl(api.to_string()))?
        .pop_if_empty()
        .push("files")
        .push(file_id);
    url.query_pairs_mut().append_pair(key, value);
    Ok(url)
}

async fn drive_get(client: &NetClient, url: &str) -> Result<Response, Error> {
    let key = &client.config().drive_api_key;
    let response = client
        .send(|| {
            let request = client.inner().get(url);
            if key.is_empty() {
                request
            } else {
                request.header(API_KEY_HEADER, key)
            }
        })
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect());
    Err(NetworkError::HttpError {
        status: status.as_u16(),
        message,
    }
    .into())
}
