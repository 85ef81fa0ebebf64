use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::FailureContext;

/// Transfer events. Every transfer carries its own `task_id` so progress from
/// concurrent downloads is never attributed to the wrong run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    Started {
        task_id: Uuid,
        url: String,
        total_bytes: Option<u64>,
    },

    /// Byte-level progress; `total` is `None` when the server sent no length.
    Progress {
        task_id: Uuid,
        read: u64,
        total: Option<u64>,
    },

    Completed {
        task_id: Uuid,
        url: String,
        path: PathBuf,
        bytes_downloaded: u64,
    },

    Failed {
        task_id: Uuid,
        url: String,
        failure: FailureContext,
    },

    Retrying {
        url: String,
        attempt: usize,
        max_attempts: usize,
        reason: String,
    },
}
