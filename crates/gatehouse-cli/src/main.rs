//! Gatehouse access controller daemon.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default configuration file
//! gatehouse
//!
//! # Run with a specific configuration file and trace logging
//! gatehouse --config ./gatehouse.toml --verbose
//!
//! # Validate a configuration file
//! gatehouse --config ./gatehouse.toml check-config
//!
//! # List serial ports
//! gatehouse list-ports
//! ```

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use gatehouse_access::{AccessController, AuditEvent, audit_channel};
use gatehouse_directory::{DirectoryClient, LdapConnector};
use gatehouse_hardware::{ProtocolLink, ReaderConfig, ReaderStateMachine, SerialSettings};

use crate::config::Config;

const DEFAULT_CONFIG_PATH: &str = "/etc/gatehouse/gatehouse.toml";
const AUDIT_LOG_TARGET: &str = "gatehouse::audit";

/// Gatehouse card reader access controller
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(about = "Grants or denies door access for Elcom card readers against an LDAP directory")]
#[command(version, disable_version_flag = true)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at trace level (RUST_LOG takes precedence)
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Default)]
enum Commands {
    /// Run the access controller (default)
    #[default]
    Run,

    /// Validate the configuration file and print a summary
    CheckConfig,

    /// List serial ports found on this host
    ListPorts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command.unwrap_or_default() {
        Commands::Run => {
            let config = load_config(&args.config)?;
            run(config).await
        }
        Commands::CheckConfig => {
            let config = load_config(&args.config)?;
            println!("Configuration valid: {}", args.config.display());
            println!();
            println!("{config}");
            Ok(())
        }
        Commands::ListPorts => list_ports(),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("loading configuration from {}", path.display()))
}

async fn run(config: Config) -> Result<()> {
    info!("Gatehouse v{} starting", env!("CARGO_PKG_VERSION"));

    let address = config.unit_address()?;
    let link = ProtocolLink::open(&config.reader.device, address, &SerialSettings::default())
        .with_context(|| format!("opening reader on {}", config.reader.device))?;
    let reader = ReaderStateMachine::new(link, ReaderConfig::default()).open();

    let directory = DirectoryClient::new(
        LdapConnector::new(config.directory.clone()),
        config.directory,
    );

    let (sink, mut audit) = audit_channel();
    let mut controller = AccessController::new(directory).with_audit_sink(sink);

    if let Err(e) = controller.connect().await {
        if let Err(close) = reader.close().await {
            warn!("Error closing reader: {}", close);
        }
        return Err(e).context("connecting to the directory");
    }

    let audit_task = tokio::spawn(async move {
        while let Some(event) = audit.recv().await {
            log_audit(&event);
        }
    });

    controller.run(reader, shutdown_signal()).await?;

    // The controller owned the only sink, so the consumer drains and exits.
    if let Err(e) = audit_task.await {
        warn!("Audit consumer failed: {}", e);
    }

    info!("Gatehouse stopped");
    Ok(())
}

fn log_audit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(line) => debug!(target: AUDIT_LOG_TARGET, "{}", line),
        Err(e) => warn!(target: AUDIT_LOG_TARGET, "Unserializable audit event: {}", e),
    }
}

fn list_ports() -> Result<()> {
    let ports = gatehouse_hardware::list_ports()?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

/// Completes on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
