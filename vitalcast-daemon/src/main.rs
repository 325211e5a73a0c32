//! Vitalcast daemon: fans a live ECG stream and its heart rate out to viewers

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vitalcast_daemon::{Daemon, DaemonConfig};

#[derive(Parser, Debug)]
#[command(name = "vitalcast-daemon", version, about = "Real-time ECG and heart-rate broadcaster")]
struct Cli {
    /// Configuration file (default: <config dir>/vitalcast/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Viewer listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    listen: Option<String>,

    /// Wave batch interval in milliseconds
    #[arg(long)]
    batch_ms: Option<u64>,

    /// Pending samples that trigger a batch drop
    #[arg(long)]
    max_batch: Option<usize>,

    /// Do not start the built-in ECG producer
    #[arg(long)]
    no_producer: bool,

    /// Log filter when RUST_LOG is unset (e.g. info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(batch_ms) = self.batch_ms {
            config.batcher.batch_ms = batch_ms;
        }
        if let Some(max_batch) = self.max_batch {
            config.batcher.max_batch = max_batch;
        }
        if self.no_producer {
            config.producer.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    info!("Starting Vitalcast daemon v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load_from(path),
        None => DaemonConfig::load(),
    }
    .context("Failed to load config")?;
    cli.apply(&mut config);
    info!("Loaded configuration from {}", config.config_path.display());

    let daemon = Daemon::start(config).await.context("Failed to start daemon")?;
    let mut quit = daemon.shutdown_signal();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = quit.changed() => {
            info!("Shutdown requested over control socket");
        }
    }

    daemon.shutdown().await;
    Ok(())
}
