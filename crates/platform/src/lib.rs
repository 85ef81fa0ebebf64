#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Platform operations used by installer steps.
//!
//! This crate wraps the side-effecting primitives the step executor needs:
//! - Archive extraction (zip and 7z self-extracting executables)
//! - Pattern-based copying and tolerant deletion
//! - Hidden (optionally elevated) process launches
//! - Host process detection and the cross-process run lock

pub mod archive;
pub mod fs;
pub mod lock;
pub mod process;

pub use archive::{extract_sfx, extract_zip, SFX_SIGNATURE};
pub use fs::{copy_by_pattern, delete_path};
pub use lock::{lock_owner, LockGuard};
pub use process::{
    is_pid_alive, is_process_running, run_hidden, run_special_setup, CommandOutput, PlatformCommand,
    STDERR_LIMIT,
};
