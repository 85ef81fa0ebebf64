#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package execution engine for aucat
//!
//! Runs the declarative install and uninstall steps of a catalog package
//! against a [`Host`]: placeholder expansion, source resolution, the
//! storefront login flow, step dispatch, progress threading, the
//! precondition gate and hash-based detection of installed versions.

#[macro_use]
mod macros;
pub mod auth;
pub mod context;
pub mod detect;
pub mod expand;
pub mod gate;
pub mod host;
pub mod installer;
pub mod progress;
pub mod source;
pub mod steps;

pub use auth::{AuthFlow, AuthState, AuthSurface};
pub use context::{ExecutionContext, StepOutput};
pub use detect::{detect_versions, UNKNOWN_VERSION};
pub use expand::expand;
pub use gate::check_preconditions;
pub use host::{Host, LocalHost};
pub use installer::{InstallConfig, Installer, RunOptions, StateSink};
pub use progress::{ProgressCallback, ProgressReporter, SubProgress};
pub use source::{resolve_source, ResolvedSource};
pub use steps::StepRunner;

// Re-export EventSender for use by macros and run options
pub use aucat_events::EventSender;
