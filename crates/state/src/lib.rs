#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Persistent state for aucat
//!
//! Small JSON stores live in the engine's config directory: the map of
//! installed package versions, the package-state telemetry queue and the
//! cache of installed file hashes used for version detection.

pub mod hash_cache;
pub mod installed;
pub mod telemetry;

mod json;

pub use hash_cache::{file_xxh3_128_hex, HashCache};
pub use installed::InstalledStore;
pub use telemetry::{EventKind, PackageStateMeta, PackageStateReporter, TelemetryEvent};
