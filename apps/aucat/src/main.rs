//! aucat - declarative package installer for AviUtl2
//!
//! Loads catalog descriptors and drives the execution engine, rendering its
//! events on the console.

mod auth;
mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::auth::ConsoleAuthSurface;
use crate::cli::{Cli, Commands, TelemetryCommands};
use crate::display::{OperationResult, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use aucat_config::constants::{BOOTH_SESSION_FILE, INSTALLED_FILE};
use aucat_config::Config;
use aucat_events::{EventReceiver, EventSender};
use aucat_install::{Host, InstallConfig, Installer, LocalHost, RunOptions};
use aucat_net::{NetClient, NetConfig};
use aucat_state::{InstalledStore, PackageStateReporter};
use aucat_types::{parse_catalog, PackageDescriptor};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::select;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    let config = match load_config(&cli.global).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    init_tracing(json_mode, cli.global.debug, config.logs_dir().ok().as_deref());

    if let Err(e) = run(cli, config).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Load configuration with file < environment < CLI flag precedence
async fn load_config(global: &cli::GlobalArgs) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, global);
    Ok(config)
}

fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs) {
    if let Some(root) = &global.app_root {
        config.paths.app_root = Some(root.clone());
    }
    if global.dev {
        config.general.dev_mode = true;
    }
}

/// Main application logic
async fn run(cli: Cli, config: Config) -> Result<(), CliError> {
    info!("Starting aucat v{}", env!("CARGO_PKG_VERSION"));

    let (event_sender, event_receiver) = aucat_events::channel();
    let colors_enabled = console::Term::stderr().features().colors_supported();
    let mut event_handler = EventHandler::new(colors_enabled, cli.global.debug);
    let renderer = OutputRenderer::new(cli.global.json);

    let result = execute_command_with_events(
        cli.command,
        &config,
        event_sender,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render_result(&result)?;
    info!("Command completed successfully");
    Ok(())
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    config: &Config,
    event_sender: EventSender,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<OperationResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, config, event_sender));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                match event {
                    Some(event) => event_handler.handle_event(event),
                    None => { /* Channel closed: keep waiting for command to finish */ }
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    config: &Config,
    event_sender: EventSender,
) -> Result<OperationResult, CliError> {
    let config_dir = config.config_dir()?;
    let telemetry = Arc::new(telemetry_reporter(config, &config_dir)?);

    match command {
        Commands::Install { catalog, packages } => {
            let descriptors = select_packages(&catalog, &packages).await?;
            let installer = build_installer(config, &config_dir, Arc::clone(&telemetry))?;
            for descriptor in &descriptors {
                let options = RunOptions::new().with_event_sender(event_sender.clone());
                installer.install(descriptor, options).await?;
            }
            send_snapshot(config, &config_dir, &telemetry).await;
            Ok(OperationResult::Success(format!(
                "Installed {} package(s)",
                descriptors.len()
            )))
        }

        Commands::Uninstall { catalog, packages } => {
            let descriptors = select_packages(&catalog, &packages).await?;
            let installer = build_installer(config, &config_dir, Arc::clone(&telemetry))?;
            for descriptor in &descriptors {
                let options = RunOptions::new().with_event_sender(event_sender.clone());
                installer.uninstall(descriptor, options).await?;
            }
            send_snapshot(config, &config_dir, &telemetry).await;
            Ok(OperationResult::Success(format!(
                "Uninstalled {} package(s)",
                descriptors.len()
            )))
        }

        Commands::Installed => {
            let store = InstalledStore::new(config_dir.join(INSTALLED_FILE));
            Ok(OperationResult::Installed(store.load().await?))
        }

        Commands::Detect { catalog } => {
            let descriptors = read_catalog(&catalog).await?;
            let host = LocalHost::from_config(config)?;
            Ok(OperationResult::Installed(
                host.query_installed_versions(&descriptors).await?,
            ))
        }

        Commands::Login { cookie } => {
            let cookie = cookie.trim();
            if cookie.is_empty() {
                return Err(CliError::InvalidArguments("cookie is empty".to_string()));
            }
            aucat_net::save_session(&config_dir.join(BOOTH_SESSION_FILE), cookie).await?;
            Ok(OperationResult::Success("Store session saved".to_string()))
        }

        Commands::Telemetry(TelemetryCommands::Flush) => {
            telemetry.flush().await?;
            let left = telemetry.pending().await?.len();
            Ok(OperationResult::Success(format!("{left} event(s) still queued")))
        }

        Commands::Telemetry(TelemetryCommands::Reset) => {
            telemetry.reset().await?;
            Ok(OperationResult::Success("Telemetry queue reset".to_string()))
        }

        Commands::Telemetry(TelemetryCommands::Pending) => {
            Ok(OperationResult::Pending(telemetry.pending().await?))
        }
    }
}

fn build_installer(
    config: &Config,
    config_dir: &Path,
    telemetry: Arc<PackageStateReporter>,
) -> Result<Installer, CliError> {
    let host = LocalHost::from_config(config)?;
    let surface = ConsoleAuthSurface::new(config_dir.join(BOOTH_SESSION_FILE));
    Ok(Installer::new(Arc::new(host), InstallConfig::from(config))
        .with_telemetry(telemetry)
        .with_auth_surface(Arc::new(surface)))
}

fn telemetry_reporter(config: &Config, config_dir: &Path) -> Result<PackageStateReporter, CliError> {
    let client = NetClient::new(NetConfig::from(&config.network))?;
    Ok(PackageStateReporter::new(
        config_dir,
        &config.telemetry,
        client,
        env!("CARGO_PKG_VERSION"),
    ))
}

/// Queue a snapshot of installed ids when one is due; never fails the command.
async fn send_snapshot(config: &Config, config_dir: &Path, telemetry: &PackageStateReporter) {
    if !config.telemetry.is_enabled() {
        return;
    }
    let store = InstalledStore::new(config_dir.join(INSTALLED_FILE));
    let ids = match store.load().await {
        Ok(map) => map.into_keys().collect::<Vec<_>>(),
        Err(e) => {
            warn!("Failed to read installed packages: {}", e);
            return;
        }
    };
    if let Err(e) = telemetry.maybe_snapshot(&ids).await {
        warn!("Failed to send snapshot: {}", e);
    }
}

async fn read_catalog(catalog: &Path) -> Result<Vec<PackageDescriptor>, CliError> {
    let text = tokio::fs::read_to_string(catalog)
        .await
        .map_err(|e| CliError::Catalog(format!("{}: {e}", catalog.display())))?;
    parse_catalog(&text).map_err(|e| CliError::Catalog(format!("{}: {e}", catalog.display())))
}

/// Read `catalog` and pick `ids` in the order given.
async fn select_packages(catalog: &Path, ids: &[String]) -> Result<Vec<PackageDescriptor>, CliError> {
    let descriptors = read_catalog(catalog).await?;
    pick(&descriptors, ids)
}

fn pick(descriptors: &[PackageDescriptor], ids: &[String]) -> Result<Vec<PackageDescriptor>, CliError> {
    ids.iter()
        .map(|id| {
            descriptors
                .iter()
                .find(|d| d.id == *id)
                .cloned()
                .ok_or_else(|| CliError::InvalidArguments(format!("package not in catalog: {id}")))
        })
        .collect()
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool, logs_dir: Option<&Path>) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;

    if debug_enabled {
        if let Some(file) = logs_dir.and_then(create_log_file) {
            let (path, file) = file;
            tracing_subscriber::fmt()
                .json()
                .with_writer(file)
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                        tracing_subscriber::EnvFilter::new("info,aucat=debug,aucat_install=debug")
                    }),
                )
                .init();
            if !json_mode {
                eprintln!("Debug logging enabled: {}", path.display());
            }
            return;
        }
    }

    if json_mode {
        // JSON mode: keep stdout clean for the result document
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}

fn create_log_file(dir: &Path) -> Option<(PathBuf, std::fs::File)> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Warning: Failed to create log directory: {e}");
        return None;
    }
    let path = dir.join(format!(
        "aucat-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    match std::fs::File::create(&path) {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aucat_types::{InstallerSpec, SourceSpec};

    fn descriptor(id: &str) -> PackageDescriptor {
        PackageDescriptor {
            id: id.to_string(),
            latest_version: None,
            installer: InstallerSpec {
                source: SourceSpec::Direct("https://example.com/a.zip".to_string()),
                install: Vec::new(),
                uninstall: Vec::new(),
            },
            versions: Vec::new(),
        }
    }

    #[test]
    fn pick_keeps_requested_order() {
        let all = vec![descriptor("A"), descriptor("B")];
        let picked = pick(&all, &["B".to_string(), "A".to_string()]).unwrap();
        assert_eq!(picked[0].id, "B");
        assert_eq!(picked[1].id, "A");
        assert!(pick(&all, &["C".to_string()]).is_err());
    }
}
