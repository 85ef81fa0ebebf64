use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Uninstallation run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UninstallEvent {
    Started {
        package: String,
        steps: usize,
    },

    /// A delete step finished; `existed` is false when the path was already gone
    PathRemoved { package: String, path: String, existed: bool },

    Completed { package: String },

    Failed {
        package: String,
        failure: FailureContext,
    },
}
