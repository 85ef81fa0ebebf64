//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aucat - declarative package installer for AviUtl2
#[derive(Parser)]
#[command(name = "aucat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Declarative package installer for AviUtl2 catalogs")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to the logs directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host application root directory
    #[arg(long, global = true, value_name = "DIR", env = "AUCAT_APP_ROOT")]
    pub app_root: Option<PathBuf>,

    /// Keep per-run temp directories
    #[arg(long, global = true)]
    pub dev: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Install packages from a catalog file
    #[command(alias = "i")]
    Install {
        /// Catalog JSON file (one descriptor or an array)
        #[arg(long, short = 'c', value_name = "FILE")]
        catalog: PathBuf,

        /// Package ids to install, in order
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Uninstall packages described in a catalog file
    #[command(alias = "rm")]
    Uninstall {
        /// Catalog JSON file (one descriptor or an array)
        #[arg(long, short = 'c', value_name = "FILE")]
        catalog: PathBuf,

        /// Package ids to uninstall, in order
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// List installed packages
    #[command(alias = "ls")]
    Installed,

    /// Detect installed versions from the files on disk
    Detect {
        /// Catalog JSON file (one descriptor or an array)
        #[arg(long, short = 'c', value_name = "FILE")]
        catalog: PathBuf,
    },

    /// Store a storefront session cookie for authenticated downloads
    Login {
        /// Cookie header value copied from a logged-in browser
        cookie: String,
    },

    /// Usage statistics queue
    #[command(subcommand)]
    Telemetry(TelemetryCommands),
}

#[derive(Subcommand)]
pub enum TelemetryCommands {
    /// Post queued events now
    Flush,

    /// Drop queued events and reset the snapshot timer
    Reset,

    /// Show queued events
    Pending,
}
