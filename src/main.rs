//! volcano-pilot: A terminal UI for administering Volcano compute clusters

use clap::Parser;
use color_eyre::Result;
use gateway_rs::{GatewayClient, GatewayConfig};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};
use volcano_pilot_core::{EndpointStore, FileStore, MemoryStore, PortPolicy, PortStore};
use volcano_pilot_tui::App;
use volcano_pilot_tui::audit::{self, AuditLogger};

/// volcano-pilot: Terminal UI for Volcano compute clusters
#[derive(Parser, Debug)]
#[command(name = "volcano-pilot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway base URL (overrides the config file)
    #[arg(short, long)]
    gateway: Option<String>,

    /// Cluster to select at startup
    #[arg(short, long)]
    cluster: Option<String>,

    /// Path to the config file (default: ~/.volcano-pilot/config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log file path (default: /tmp/volcano-pilot.log)
    #[arg(long, default_value = "/tmp/volcano-pilot.log")]
    log_file: String,

    /// Number of log lines to fetch per pod (default: 50)
    #[arg(short, long, default_value = "50")]
    tail: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging to file (not stdout, which would corrupt TUI)
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let log_file = File::create(&cli.log_file)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(true)
                .with_target(false),
        )
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    tracing::info!("Starting volcano-pilot");

    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load_from(path)?,
        None => GatewayConfig::load_default()?,
    };
    if let Some(gateway) = cli.gateway {
        config.gateway = gateway;
    }
    tracing::info!(gateway = %config.gateway_url(), "using gateway");

    let client = GatewayClient::new(&config)?;

    let backing: Box<dyn PortStore> = match FileStore::default_path() {
        Some(path) => Box::new(FileStore::open(path)),
        None => {
            tracing::warn!("no home directory, saved ports will not persist");
            Box::new(MemoryStore::new())
        }
    };
    let store = Arc::new(Mutex::new(EndpointStore::new(
        backing,
        config.default_agent_port.clone(),
    )));
    let policy = PortPolicy::new(
        config.default_agent_port.clone(),
        config.port_corrections.clone(),
    );

    if let Some(logger) = AuditLogger::new() {
        audit::init(logger);
    }

    // Run the TUI
    let download_dir = config.download_dir();
    let mut app = App::new(client, store, policy, cli.cluster, cli.tail, download_dir);
    app.run().await?;

    tracing::info!("Goodbye!");
    Ok(())
}
