//! Run progress threading
//!
//! Each step owns one unit of the run. Byte-level transfer progress is
//! mapped into the running step's unit: linearly when the total size is
//! known, otherwise by a fixed increment per signal that stops just short of
//! the next unit.

use aucat_events::{build_progress, EventEmitter, EventSender, ProgressEvent, ProgressPhase};
use aucat_net::{ProgressSink, TransferProgress};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Caller-supplied progress observer
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Share of a unit added per signal when the transfer size is unknown.
const UNKNOWN_TOTAL_INCREMENT: f64 = 0.05;
/// Gap kept below the next unit while a transfer is still running.
const UNIT_CEILING_GAP: f64 = 0.01;

/// Emits aggregated progress to the caller and the event bus.
#[derive(Clone)]
pub struct ProgressReporter {
    total_steps: usize,
    callback: Option<ProgressCallback>,
    events: Option<EventSender>,
    package: String,
}

impl EventEmitter for ProgressReporter {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }

    fn correlation_id(&self) -> Option<&str> {
        Some(&self.package)
    }
}

impl ProgressReporter {
    #[must_use]
    pub fn new(
        total_steps: usize,
        callback: Option<ProgressCallback>,
        events: Option<EventSender>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            total_steps,
            callback,
            events,
            package: package.into(),
        }
    }

    /// Build and deliver one progress snapshot.
    ///
    /// A panicking callback is logged and otherwise ignored.
    pub fn report(
        &self,
        completed_units: f64,
        action: Option<&str>,
        index: Option<usize>,
        phase: ProgressPhase,
    ) {
        let event = build_progress(self.total_steps, completed_units, action, index, phase);
        if let Some(callback) = &self.callback {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                tracing::warn!(package = %self.package, "progress callback panicked");
            }
        }
        self.emit_progress(event);
    }

    /// Transfer observer for the step at `index`, ignoring signals from any
    /// transfer other than `task_id`.
    #[must_use]
    pub fn transfer_sink(&self, index: usize, action: &str, task_id: Uuid) -> ProgressSink {
        let reporter = self.clone();
        let action = action.to_string();
        let tracker = Mutex::new(SubProgress::new(index));
        Arc::new(move |signal: TransferProgress| {
            if signal.task_id != task_id {
                return;
            }
            let units = match tracker.lock() {
                Ok(mut tracker) => tracker.advance(signal.read, signal.total),
                Err(_) => None,
            };
            if let Some(units) = units {
                reporter.report(units, Some(&action), Some(index), ProgressPhase::Running);
            }
        })
    }
}

/// Position inside one step's unit interval.
#[derive(Debug, Clone, Copy)]
pub struct SubProgress {
    start: f64,
    ceiling: f64,
    unknown_units: f64,
    /// Highest value handed out; a restarted transfer never goes below it.
    reached: f64,
}

impl SubProgress {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(index: usize) -> Self {
        let start = index as f64;
        Self {
            start,
            ceiling: start + 1.0 - UNIT_CEILING_GAP,
            unknown_units: start,
            reached: start,
        }
    }

    /// Completed units after a transfer signal, or `None` when the signal
    /// carries no information.
    ///
    /// The result never decreases, so a transfer retried from zero bytes
    /// holds its position until it passes the earlier attempt.
    #[allow(clippy::cast_precision_loss)]
    pub fn advance(&mut self, read: u64, total: Option<u64>) -> Option<f64> {
        let units = match total {
            Some(total) if total > 0 => {
                let ratio = (read as f64 / total as f64).clamp(0.0, 1.0);
                self.start + ratio
            }
            _ if read > 0 => {
                self.unknown_units = (self.unknown_units.max(self.reached) + UNKNOWN_TOTAL_INCREMENT)
                    .min(self.ceiling);
                self.unknown_units
            }
            _ => return None,
        };
        self.reached = self.reached.max(units);
        Some(self.reached)
    }
}
