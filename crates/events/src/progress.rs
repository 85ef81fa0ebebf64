//! Run progress as reported to callers
//!
//! A run of N steps is N progress units. The aggregator here is a pure
//! function of the units completed so far; callers thread the unit count
//! themselves and call [`build_progress`] for every emission.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressPhase {
    Init,
    Running,
    StepComplete,
    Done,
    Error,
}

/// One progress snapshot of an install or uninstall run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Overall completion in `[0, 1]`
    pub ratio: f64,
    /// `ratio` scaled to `0..=100` and rounded
    pub percent: u32,
    /// Action of the current step, if any
    pub step: Option<String>,
    pub step_index: Option<usize>,
    pub total_steps: usize,
    pub label: String,
    pub phase: ProgressPhase,
}

/// Human readable label for a step action.
#[must_use]
pub fn step_label(action: &str) -> &'static str {
    match action {
        "download" => "downloading",
        "extract" | "extract_sfx" => "extracting",
        "copy" => "copying",
        "run" | "run_auo_setup" => "running",
        "delete" => "deleting",
        _ => "processing",
    }
}

/// Build a progress snapshot.
///
/// `init` always reports 0 and `done` always reports 1. Otherwise the ratio
/// is `completed_units / total_steps` clamped into `[0, 1]`, with a
/// non-finite unit count treated as 0.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn build_progress(
    total_steps: usize,
    completed_units: f64,
    action: Option<&str>,
    index: Option<usize>,
    phase: ProgressPhase,
) -> ProgressEvent {
    let units = if completed_units.is_finite() {
        completed_units
    } else {
        0.0
    };
    let ratio = match phase {
        ProgressPhase::Done => 1.0,
        ProgressPhase::Init => 0.0,
        _ if total_steps == 0 => 0.0,
        _ => (units / total_steps as f64).clamp(0.0, 1.0),
    };
    let label = match phase {
        ProgressPhase::Init => "preparing",
        ProgressPhase::Error => "error",
        ProgressPhase::Done => "complete",
        ProgressPhase::Running | ProgressPhase::StepComplete => {
            action.map_or("processing", step_label)
        }
    };

    ProgressEvent {
        ratio,
        percent: (ratio * 100.0).round() as u32,
        step: action.map(str::to_string),
        step_index: index,
        total_steps,
        label: label.to_string(),
        phase,
    }
}
