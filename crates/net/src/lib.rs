#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for aucat
//!
//! This crate handles every HTTP interaction of the installer: plain https
//! downloads, cookie-authenticated store downloads, Google Drive transfers
//! and GitHub release lookups, all on a pooled client with retry logic.

mod booth;
mod client;
mod download;
mod drive;
mod github;

pub use booth::{booth_download, load_session, save_session};
pub use client::{NetClient, NetConfig};
pub use download::{
    download_to_dir, ensure_allowed_url, filename_from_content_disposition, filename_from_url,
    sanitize_filename, ProgressSink, Transfer, TransferProgress,
};
pub use drive::drive_download;
pub use github::{resolve_release_asset, GitHubSource};
