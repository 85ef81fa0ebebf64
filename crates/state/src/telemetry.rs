//! Package-state telemetry queue
//!
//! Install, uninstall and periodic snapshot events are appended to
//! `pending_events.json` and posted in order to the configured endpoint.
//! Delivery stops at the first failure; the failed event and everything after
//! it stay queued for the next flush. The anonymous installation id and the
//! time of the last delivered snapshot live in `package_state.json`.

use crate::json::{read_json, remove_file, write_json};
use aucat_config::constants::{PACKAGE_STATE_FILE, PENDING_EVENTS_FILE};
use aucat_config::TelemetryConfig;
use aucat_errors::{Error, StateError};
use aucat_net::NetClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Install,
    Uninstall,
    Snapshot,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Snapshot => "snapshot",
        }
    }
}

/// One queued telemetry record, serialised exactly as it is posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub uid: String,
    pub event_id: String,
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub client_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<Vec<String>>,
}

impl TelemetryEvent {
    fn describe(&self) -> String {
        match (&self.package_id, &self.installed) {
            (_, Some(installed)) => format!("type={} installed={}", self.kind.as_str(), installed.len()),
            (Some(id), None) => format!("type={} package_id={id}", self.kind.as_str()),
            (None, None) => format!("type={}", self.kind.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStateMeta {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub last_snapshot_ts: i64,
}

/// Serialised access to the telemetry queue and its metadata.
pub struct PackageStateReporter {
    pending_path: PathBuf,
    meta_path: PathBuf,
    endpoint: Option<String>,
    opt_out: bool,
    snapshot_interval: i64,
    client_version: String,
    client: NetClient,
    queue_lock: Mutex<()>,
}

impl PackageStateReporter {
    #[must_use]
    pub fn new(
        config_dir: &Path,
        config: &TelemetryConfig,
        client: NetClient,
        client_version: impl Into<String>,
    ) -> Self {
        let endpoint = Some(config.endpoint.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        Self {
            pending_path: config_dir.join(PENDING_EVENTS_FILE),
            meta_path: config_dir.join(PACKAGE_STATE_FILE),
            endpoint,
            opt_out: config.opt_out,
            snapshot_interval: i64::try_from(config.snapshot_interval).unwrap_or(i64::MAX),
            client_version: client_version.into(),
            client,
            queue_lock: Mutex::new(()),
        }
    }

    /// Whether events are recorded and posted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some() && !self.opt_out
    }

    /// Queue an install or uninstall event for `package_id` and flush.
    ///
    /// Does nothing when reporting is disabled or the id is blank.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue files cannot be read or written.
    /// Delivery failures are not errors; the event stays queued.
    pub async fn record(&self, kind: EventKind, package_id: &str) -> Result<(), Error> {
        let id = package_id.trim();
        if !self.is_enabled() || id.is_empty() {
            return Ok(());
        }
        let _guard = self.queue_lock.lock().await;
        let mut event = self.new_event(kind).await?;
        event.package_id = Some(id.to_string());

        let mut queue = self.load_queue().await?;
        queue.push(event);
        self.save_queue(&queue).await?;
        self.flush_locked(queue).await
    }

    /// Append `event` to the persisted queue without posting.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written.
    pub async fn enqueue(&self, event: TelemetryEvent) -> Result<(), Error> {
        let _guard = self.queue_lock.lock().await;
        let mut queue = self.load_queue().await?;
        queue.push(event);
        self.save_queue(&queue).await
    }

    /// Post every queued event in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written.
    pub async fn flush(&self) -> Result<(), Error> {
        if !self.is_enabled() {
            return Ok(());
        }
        let _guard = self.queue_lock.lock().await;
        let queue = self.load_queue().await?;
        self.flush_locked(queue).await
    }

    /// Queue a snapshot of `installed` ids when the snapshot interval has
    /// elapsed and none is already pending, then flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the state files cannot be read or written.
    pub async fn maybe_snapshot(&self, installed: &[String]) -> Result<(), Error> {
        if !self.is_enabled() {
            return Ok(());
        }
        let _guard = self.queue_lock.lock().await;
        let meta = self.load_meta().await?;
        let mut queue = self.load_queue().await?;

        let now = chrono::Utc::now().timestamp();
        let pending_snapshot = queue.iter().any(|e| e.kind == EventKind::Snapshot);
        let due = meta.last_snapshot_ts == 0
            || now.saturating_sub(meta.last_snapshot_ts) >= self.snapshot_interval;

        if due && !pending_snapshot {
            let mut event = self.new_event(EventKind::Snapshot).await?;
            event.installed = Some(installed.to_vec());
            queue.push(event);
            self.save_queue(&queue).await?;
        }
        self.flush_locked(queue).await
    }

    /// Drop every pending event and forget when the last snapshot was sent.
    /// The installation id is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the state files cannot be written.
    pub async fn reset(&self) -> Result<(), Error> {
        let _guard = self.queue_lock.lock().await;
        remove_file(&self.pending_path).await?;
        let mut meta = self.load_meta().await?;
        meta.last_snapshot_ts = 0;
        write_json(&self.meta_path, &meta).await
    }

    /// Events currently waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue file is unreadable.
    pub async fn pending(&self) -> Result<Vec<TelemetryEvent>, Error> {
        let _guard = self.queue_lock.lock().await;
        self.load_queue().await
    }

    /// Current metadata (installation id and last snapshot time).
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata file is unreadable.
    pub async fn meta(&self) -> Result<PackageStateMeta, Error> {
        self.load_meta().await
    }

    async fn flush_locked(&self, queue: Vec<TelemetryEvent>) -> Result<(), Error> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Ok(());
        };
        if queue.is_empty() {
            return Ok(());
        }

        let mut remaining = Vec::new();
        let mut events = queue.into_iter();
        while let Some(event) = events.next() {
            match self.post(endpoint, &event).await {
                Ok(()) => {
                    tracing::info!(target: "aucat::telemetry", "sent {}", event.describe());
                    if event.kind == EventKind::Snapshot {
                        self.advance_snapshot(event.ts).await?;
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "aucat::telemetry", error = %e, "send failed");
                    remaining.push(event);
                    remaining.extend(events);
                    break;
                }
            }
        }
        self.save_queue(&remaining).await
    }

    async fn post(&self, endpoint: &str, event: &TelemetryEvent) -> Result<(), Error> {
        let response = self
            .client
            .send(|| self.client.inner().post(endpoint).json(event))
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StateError::DeliveryFailed {
                message: format!("HTTP {}", status.as_u16()),
            }
            .into())
        }
    }

    async fn advance_snapshot(&self, ts: i64) -> Result<(), Error> {
        let mut meta = self.load_meta().await?;
        if ts > meta.last_snapshot_ts {
            meta.last_snapshot_ts = ts;
            write_json(&self.meta_path, &meta).await?;
        }
        Ok(())
    }

    async fn new_event(&self, kind: EventKind) -> Result<TelemetryEvent, Error> {
        Ok(TelemetryEvent {
            uid: self.uid().await?,
            event_id: uuid::Uuid::new_v4().to_string(),
            ts: chrono::Utc::now().timestamp(),
            kind,
            client_version: self.client_version.clone(),
            package_id: None,
            installed: None,
        })
    }

    async fn uid(&self) -> Result<String, Error> {
        let mut meta = self.load_meta().await?;
        if meta.uid.is_empty() {
            meta.uid = uuid::Uuid::new_v4().to_string();
            write_json(&self.meta_path, &meta).await?;
        }
        Ok(meta.uid)
    }

    async fn load_meta(&self) -> Result<PackageStateMeta, Error> {
        Ok(read_json(&self.meta_path).await?.unwrap_or_default())
    }

    async fn load_queue(&self) -> Result<Vec<TelemetryEvent>, Error> {
        Ok(read_json(&self.pending_path).await?.unwrap_or_default())
    }

    async fn save_queue(&self, queue: &[TelemetryEvent]) -> Result<(), Error> {
        if queue.is_empty() {
            remove_file(&self.pending_path).await
        } else {
            write_json(&self.pending_path, &queue).await
        }
    }
}
