//! Streaming file downloads with byte progress

use aucat_errors::{Error, NetworkError};
use aucat_events::{AppEvent, DownloadEvent, EventEmitter, EventSender, FailureContext};
use futures::StreamExt;
use percent_encoding::percent_decode_str;
use reqwest::Response;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self as tokio_fs, File};
use tokio::io::AsyncWriteExt;
use url::Url;
use uuid::Uuid;

use crate::NetClient;

const BODY_SNIPPET_CHARS: usize = 500;
const FALLBACK_FILE_NAME: &str = "download.bin";

/// Byte-level progress of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub task_id: Uuid,
    pub read: u64,
    /// `None` when the server did not announce a length
    pub total: Option<u64>,
}

/// Receiver of [`TransferProgress`] updates
pub type ProgressSink = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Identity and observers of a single transfer.
#[derive(Clone)]
pub struct Transfer {
    pub task_id: Uuid,
    progress: Option<ProgressSink>,
    events: Option<EventSender>,
}

impl Transfer {
    #[must_use]
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            progress: None,
            events: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.events = Some(tx);
        self
    }

    /// Deliver a byte-count update to the progress sink and the event bus.
    pub fn report(&self, read: u64, total: Option<u64>) {
        if let Some(sink) = &self.progress {
            sink(TransferProgress {
                task_id: self.task_id,
                read,
                total,
            });
        }
        self.emit(AppEvent::Download(DownloadEvent::Progress {
            task_id: self.task_id,
            read,
            total,
        }));
    }

    fn report_failed(&self, url: &str, error: &Error) {
        self.emit(AppEvent::Download(DownloadEvent::Failed {
            task_id: self.task_id,
            url: url.to_string(),
            failure: FailureContext::from_error(error),
        }));
    }
}

impl EventEmitter for Transfer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

/// Parse a download URL, refusing anything but https unless `allow_http`.
///
/// # Errors
///
/// Returns `InvalidUrl` for unparsable input and `InsecureUrl` for other schemes.
pub fn ensure_allowed_url(url: &str, allow_http: bool) -> Result<Url, Error> {
    let parsed = Url::parse(url.trim()).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if allow_http => Ok(parsed),
        _ => Err(NetworkError::InsecureUrl {
            url: url.to_string(),
        }
        .into()),
    }
}

/// Replace path separators and characters reserved on Windows with `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name from the last non-empty path segment, percent-decoded.
#[must_use]
pub fn filename_from_url(url: &Url) -> String {
    let raw = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or(FALLBACK_FILE_NAME);
    sanitize_filename(&percent_decode_str(raw).decode_utf8_lossy())
}

/// File name from a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987) wins over a plain `filename` parameter.
#[must_use]
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let name = encoded.split_once("''").map_or(encoded, |(_, rest)| rest);
            let decoded = percent_decode_str(name.trim_matches('"')).decode_utf8_lossy();
            if !decoded.trim().is_empty() {
                return Some(sanitize_filename(&decoded));
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.trim().is_empty() {
                plain = Some(sanitize_filename(name));
            }
        }
    }
    plain
}

/// Turn a non-2xx response into `HttpError` carrying a body snippet.
pub(crate) async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
    let message = if snippet.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {snippet}")
    };
    Err(NetworkError::HttpError {
        status: status.as_u16(),
        message,
    }
    .into())
}

/// Stream a response body into `dest` through a `.part` file.
pub(crate) async fn stream_to_file(
    response: Response,
    dest: &Path,
    transfer: &Transfer,
) -> Result<u64, Error> {
    if let Some(parent) = dest.parent() {
        tokio_fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_with_path(&e, parent))?;
    }

    let total = response.content_length();
    let part_path = part_path(dest);
    let mut file = File::create(&part_path)
        .await
        .map_err(|e| Error::io_with_path(&e, &part_path))?;

    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        transfer.report(written, total);
    }
    file.flush().await?;
    drop(file);

    tokio_fs::rename(&part_path, dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Finish a transfer whose response is already known to be successful.
pub(crate) async fn save_response(
    response: Response,
    url: &str,
    dest: PathBuf,
    transfer: &Transfer,
) -> Result<PathBuf, Error> {
    transfer.emit(AppEvent::Download(DownloadEvent::Started {
        task_id: transfer.task_id,
        url: url.to_string(),
        total_bytes: response.content_length(),
    }));

    match stream_to_file(response, &dest, transfer).await {
        Ok(bytes) => {
            tracing::info!(task_id = %transfer.task_id, url, path = %dest.display(), bytes, "download complete");
            transfer.emit(AppEvent::Download(DownloadEvent::Completed {
                task_id: transfer.task_id,
                url: url.to_string(),
                path: dest.clone(),
                bytes_downloaded: bytes,
            }));
            Ok(dest)
        }
        Err(e) => {
            let _ = tokio_fs::remove_file(part_path(&dest)).await;
            transfer.report_failed(url, &e);
            Err(e)
        }
    }
}

/// Download `url` into `dest_dir`, naming the file after the URL.
///
/// # Errors
///
/// Returns an error for disallowed URLs, transport failures, non-2xx
/// responses (with a body snippet) and file system failures.
pub async fn download_to_dir(
    client: &NetClient,
    url: &str,
    dest_dir: &Path,
    transfer: &Transfer,
) -> Result<PathBuf, Error> {
    let parsed = ensure_allowed_url(url, client.config().allow_http)?;
    let dest = dest_dir.join(filename_from_url(&parsed));
    tracing::debug!(task_id = %transfer.task_id, url, dest = %dest.display(), "starting download");

    let response = match client.get(parsed.as_str()).await {
        Ok(response) => check_status(response).await,
        Err(e) => Err(e),
    };
    let response = response.inspect_err(|e| transfer.report_failed(url, e))?;
    save_response(response, url, dest, transfer).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_filename("a:b*c?.zip"), "a_b_c_.zip");
        assert_eq!(sanitize_filename("  "), "download.bin");
        assert_eq!(sanitize_filename("dir/evil\\name"), "dir_evil_name");
        assert_eq!(sanitize_filename(".."), "download.bin");
        assert_eq!(sanitize_filename(" . "), "download.bin");
        assert_eq!(sanitize_filename(".hidden"), ".hidden");
    }

    #[test]
    fn filename_comes_from_last_segment() {
        let url = Url::parse("https://example.com/files/My%20Plugin%20v1.zip?x=1").unwrap();
        assert_eq!(filename_from_url(&url), "My Plugin v1.zip");
        let url = Url::parse("https://example.com/dl/").unwrap();
        assert_eq!(filename_from_url(&url), "dl");
        let url = Url::parse("https://example.com").unwrap();
        assert_eq!(filename_from_url(&url), "download.bin");
    }

    #[test]
    fn only_https_unless_allowed() {
        assert!(ensure_allowed_url("https://example.com/a.zip", false).is_ok());
        let err = ensure_allowed_url("http://example.com/a.zip", false).unwrap_err();
        assert!(matches!(err, Error::Network(NetworkError::InsecureUrl { .. })));
        assert!(ensure_allowed_url("http://example.com/a.zip", true).is_ok());
        assert!(ensure_allowed_url("ftp://example.com/a.zip", true).is_err());
        assert!(ensure_allowed_url("not a url", false).is_err());
    }

    #[test]
    fn parses_content_disposition() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="plugin.zip""#).as_deref(),
            Some("plugin.zip")
        );
        assert_eq!(
            filename_from_content_disposition(
                "attachment; filename=\"fallback.zip\"; filename*=UTF-8''%E3%83%97%E3%83%A9%E3%82%B0.zip"
            )
            .as_deref(),
            Some("プラグ.zip")
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="..""#).as_deref(),
            Some("download.bin")
        );
    }

    #[test]
    fn part_file_sits_beside_destination() {
        assert_eq!(
            part_path(Path::new("/tmp/x/a.zip")),
            PathBuf::from("/tmp/x/a.zip.part")
        );
    }
}
