//! Lore - persistent learning store for AI assistants
//!
//! Main entry point: resolves configuration, opens the storage backend and
//! serves the MCP endpoint until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use lore_config::{LoggingConfig, example_config, load_config};
use lore_server::Server;
use lore_store::open_backend;

mod startup;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Lore - persistent learning store for AI assistants, served over MCP
#[derive(Parser)]
#[command(name = "lore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Print an example configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", example_config());
        return Ok(());
    }

    let loaded = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let config = loaded.config;

    let _guard = init_tracing(&config.logging, cli.verbose)?;

    match &loaded.source {
        Some(path) => info!(path = %path.display(), "Loaded configuration"),
        None => info!("No config file found, using defaults"),
    }

    let addr = config
        .server
        .socket_addr()
        .context("Invalid server address")?;

    let backend_config = startup::backend_config(&config);
    let backend = open_backend(&backend_config)
        .await
        .with_context(|| format!("Failed to open {} backend", backend_config.kind()))?;

    let served = Server::new(backend.clone())
        .run(addr, shutdown_signal())
        .await;

    if let Err(e) = backend.close().await {
        warn!(error = %e, "Failed to close backend");
    }

    served.context("Server failed")
}

/// Install the console layer and, when a log directory is configured, a
/// daily-rotated JSON file layer. The returned guard flushes the file writer
/// on drop.
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, prelude::*};

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = startup::log_filter(&logging.level, rust_log.as_deref(), verbose);

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(EnvFilter::try_new(&filter).context("Invalid log filter")?);

    let (file, guard) = match logging.log_dir() {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "lore.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::try_new(&filter).context("Invalid log filter")?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();

    Ok(guard)
}

/// Resolves on Ctrl-C. If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
