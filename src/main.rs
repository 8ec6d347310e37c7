//! Bambu Lab Exporter CLI
//!
//! Runs the exporter against the simulated printer and serves the
//! metrics for Prometheus to scrape.

use std::path::PathBuf;
use std::sync::Arc;

use bambulab_exporter::{
    config::{ConfigError, FileConfig},
    device::{DeviceClient, DeviceError, SimulatedPrinter},
    lifecycle::{LifecycleDetector, LifecycleMode},
    metrics::{MetricsError, MetricsServer, PrinterMetrics, ServerError},
    projection::Projector,
    resync::ResyncScheduler,
    shutdown,
    state::StateSource,
};
use clap::Parser;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Buffered device messages before the client waits.
const MESSAGE_CAPACITY: usize = 256;

/// Buffered reports awaiting projection before new ones are dropped.
const UPDATE_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "bambulab-exporter", version, about = "Prometheus exporter for Bambu Lab printers")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Printer serial, used as the `device` label.
    #[arg(long, env = "BAMBU_DEVICE_ID")]
    device_id: Option<String>,

    /// Port for the scrape endpoint.
    #[arg(long, env = "HTTP_PORT")]
    port: Option<u16>,

    /// Route serving the metrics.
    #[arg(long)]
    metrics_path: Option<String>,

    /// Log filter, e.g. `info` or `debug`.
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// How finished prints are counted: `events` or `percent`.
    #[arg(long)]
    lifecycle_mode: Option<LifecycleMode>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("metrics registry: {0}")]
    Metrics(#[from] MetricsError),
    #[error("printer connection: {0}")]
    Device(#[from] DeviceError),
    #[error("scrape endpoint: {0}")]
    Server(#[from] ServerError),
    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

fn load_config(cli: &Cli) -> Result<FileConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    if let Some(id) = &cli.device_id {
        config.device.id = id.clone();
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    if let Some(path) = &cli.metrics_path {
        config.http.path = path.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if let Some(mode) = cli.lifecycle_mode {
        config.lifecycle.mode = mode;
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

#[tokio::main]
async fn main() {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);
    info!("Bambulab exporter v{}", bambulab_exporter::VERSION);

    if let Err(e) = run(config).await {
        error!(error = %e, "Startup failed");
        eprintln!("Failed to start exporter: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: FileConfig) -> Result<(), StartupError> {
    let metrics = Arc::new(PrinterMetrics::new(&config.device.id)?);
    let server = MetricsServer::bind(config.server_config(), Arc::clone(&metrics)).await?;

    let device = Arc::new(SimulatedPrinter::new(config.simulation.clone()));
    let (message_tx, message_rx) = mpsc::channel(MESSAGE_CAPACITY);
    device.subscribe(message_tx);
    device.connect()?;
    info!(device = %config.device.id, "Connected to printer");

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    // Listeners
    let (source, updates, events) = StateSource::new(UPDATE_CAPACITY, config.lifecycle.event_capacity);
    let source_handle = tokio::spawn(source.run(message_rx, shutdown_rx.clone()));

    let projector = Projector::new(Arc::clone(&metrics), config.lifecycle.mode);
    let projection_handle = tokio::spawn(projector.run(updates, shutdown_rx.clone()));

    let lifecycle_handle = match config.lifecycle.mode {
        LifecycleMode::Events => {
            let detector = LifecycleDetector::new(Arc::clone(&metrics));
            Some(tokio::spawn(detector.run(events, shutdown_rx.clone())))
        }
        LifecycleMode::Percent => {
            info!("Counting finished prints from completion percent");
            drop(events);
            None
        }
    };

    let server_handle = tokio::spawn(server.run(shutdown_rx.clone()));

    let scheduler = ResyncScheduler::from_config(&config.resync);
    let resync_device = Arc::clone(&device);
    let resync_shutdown = shutdown_rx.clone();
    let resync_handle =
        tokio::spawn(async move { scheduler.run(resync_device, resync_shutdown).await });

    wait_for_signal().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    join(resync_handle, "resync scheduler").await;
    join(source_handle, "state source").await;
    join(projection_handle, "projection listener").await;
    if let Some(handle) = lifecycle_handle {
        join(handle, "lifecycle listener").await;
    }

    device.disconnect();

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Metrics server stopped with error"),
        Err(e) => warn!(error = %e, "Metrics server task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}

async fn join(handle: JoinHandle<()>, unit: &str) {
    if let Err(e) = handle.await {
        warn!(unit, error = %e, "Task ended abnormally");
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
