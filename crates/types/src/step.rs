//! Install and uninstall step vocabularies
//!
//! Steps are stored in catalogs as flat JSON objects keyed by `action`.
//! They are converted into closed enums on load so the executor can match
//! exhaustively; an unknown action survives as `Unsupported` and fails at
//! its own position in the sequence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every action the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepAction {
    Download,
    Extract,
    ExtractSfx,
    Copy,
    Run,
    RunAuoSetup,
    Delete,
}

impl StepAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Extract => "extract",
            Self::ExtractSfx => "extract_sfx",
            Self::Copy => "copy",
            Self::Run => "run",
            Self::RunAuoSetup => "run_auo_setup",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(Self::Download),
            "extract" => Ok(Self::Extract),
            "extract_sfx" => Ok(Self::ExtractSfx),
            "copy" => Ok(Self::Copy),
            "run" => Ok(Self::Run),
            "run_auo_setup" => Ok(Self::RunAuoSetup),
            "delete" => Ok(Self::Delete),
            other => Err(other.to_string()),
        }
    }
}

/// Process launch parameters shared by install and uninstall `run` steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub path: String,
    pub args: Vec<String>,
    pub elevate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStep", into = "RawStep")]
pub enum InstallStep {
    Download,
    Extract {
        from: Option<String>,
        to: Option<String>,
    },
    ExtractSfx {
        from: Option<String>,
        to: Option<String>,
    },
    Copy {
        from: Option<String>,
        to: Option<String>,
    },
    Run(RunSpec),
    RunAuoSetup {
        path: String,
    },
    Unsupported {
        action: String,
    },
}

impl InstallStep {
    /// Action name as written in the catalog.
    #[must_use]
    pub fn action(&self) -> &str {
        match self {
            Self::Download => StepAction::Download.as_str(),
            Self::Extract { .. } => StepAction::Extract.as_str(),
            Self::ExtractSfx { .. } => StepAction::ExtractSfx.as_str(),
            Self::Copy { .. } => StepAction::Copy.as_str(),
            Self::Run(_) => StepAction::Run.as_str(),
            Self::RunAuoSetup { .. } => StepAction::RunAuoSetup.as_str(),
            Self::Unsupported { action } => action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStep", into = "RawStep")]
pub enum UninstallStep {
    Delete { path: String },
    Run(RunSpec),
    Unsupported { action: String },
}

impl UninstallStep {
    #[must_use]
    pub fn action(&self) -> &str {
        match self {
            Self::Delete { .. } => StepAction::Delete.as_str(),
            Self::Run(_) => StepAction::Run.as_str(),
            Self::Unsupported { action } => action,
        }
    }
}

/// Wire shape of a step in catalog JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawStep {
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    elevate: bool,
}

impl RawStep {
    fn named(action: &str) -> Self {
        Self {
            action: action.to_string(),
            ..Self::default()
        }
    }

    fn into_run(self) -> RunSpec {
        RunSpec {
            path: self.path.unwrap_or_default(),
            args: self.args,
            elevate: self.elevate,
        }
    }
}

impl From<RunSpec> for RawStep {
    fn from(run: RunSpec) -> Self {
        Self {
            action: StepAction::Run.as_str().to_string(),
            path: Some(run.path),
            args: run.args,
            elevate: run.elevate,
            ..Self::default()
        }
    }
}

impl From<RawStep> for InstallStep {
    fn from(raw: RawStep) -> Self {
        match raw.action.parse::<StepAction>() {
            Ok(StepAction::Download) => Self::Download,
            Ok(StepAction::Extract) => Self::Extract {
                from: raw.from,
                to: raw.to,
            },
            Ok(StepAction::ExtractSfx) => Self::ExtractSfx {
                from: raw.from,
                to: raw.to,
            },
            Ok(StepAction::Copy) => Self::Copy {
                from: raw.from,
                to: raw.to,
            },
            Ok(StepAction::Run) => Self::Run(raw.into_run()),
            Ok(StepAction::RunAuoSetup) => Self::RunAuoSetup {
                path: raw.path.unwrap_or_default(),
            },
            Ok(StepAction::Delete) | Err(_) => Self::Unsupported { action: raw.action },
        }
    }
}

impl From<InstallStep> for RawStep {
    fn from(step: InstallStep) -> Self {
        match step {
            InstallStep::Download => Self::named("download"),
            InstallStep::Extract { from, to } => Self {
                from,
                to,
                ..Self::named("extract")
            },
            InstallStep::ExtractSfx { from, to } => Self {
                from,
                to,
                ..Self::named("extract_sfx")
            },
            InstallStep::Copy { from, to } => Self {
                from,
                to,
                ..Self::named("copy")
            },
            InstallStep::Run(run) => run.into(),
            InstallStep::RunAuoSetup { path } => Self {
                path: Some(path),
                ..Self::named("run_auo_setup")
            },
            InstallStep::Unsupported { action } => Self::named(&action),
        }
    }
}

impl From<RawStep> for UninstallStep {
    fn from(raw: RawStep) -> Self {
        match raw.action.parse::<StepAction>() {
            Ok(StepAction::Delete) => Self::Delete {
                path: raw.path.unwrap_or_default(),
            },
            Ok(StepAction::Run) => Self::Run(raw.into_run()),
            _ => Self::Unsupported { action: raw.action },
        }
    }
}

impl From<UninstallStep> for RawStep {
    fn from(step: UninstallStep) -> Self {
        match step {
            UninstallStep::Delete { path } => Self {
                path: Some(path),
                ..Self::named("delete")
            },
            UninstallStep::Run(run) => run.into(),
            UninstallStep::Unsupported { action } => Self::named(&action),
        }
    }
}
