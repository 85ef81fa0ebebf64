#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the aucat package installer
//!
//! This crate provides the data model shared by every other crate:
//! package descriptors as they appear in catalog files, the install and
//! uninstall step vocabularies, and the host application's directory layout.

pub mod descriptor;
pub mod dirs;
pub mod step;

pub use descriptor::{
    parse_catalog, InstallerSpec, PackageDescriptor, SourceSpec, VersionEntry, VersionFile,
};
pub use dirs::AppDirs;
pub use step::{InstallStep, RunSpec, StepAction, UninstallStep};

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Used to derive file-system safe keys from package ids and versions.
#[must_use]
pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
