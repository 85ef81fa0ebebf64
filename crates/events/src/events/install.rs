use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Installation run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    Started {
        package: String,
        version: String,
        steps: usize,
    },

    StepStarted {
        package: String,
        index: usize,
        total: usize,
        action: String,
    },

    StepCompleted {
        package: String,
        index: usize,
        total: usize,
        action: String,
    },

    /// Source resolved for the download step
    SourceResolved {
        package: String,
        kind: String,
        location: String,
    },

    Completed { package: String, version: String },

    Failed {
        package: String,
        version: String,
        failure: FailureContext,
    },
}
