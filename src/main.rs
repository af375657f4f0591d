//! Command-line host for the Orion 5-Star Plus driver.
//!
//! Loads settings, opens the meter and prints every event as one JSON line
//! on stdout until Ctrl-C. Logs go to stderr.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use orion_meter::adapters::SerialAdapter;
use orion_meter::{MeterHandle, Settings};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orion_meter")]
#[command(about = "Stream events from an Orion 5-Star Plus meter as JSON lines")]
struct Cli {
    /// TOML settings file; ORION_* environment variables still override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overriding the settings
    #[arg(short, long)]
    port: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("invalid log filter")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if settings.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    settings.json_logs |= cli.json_logs;
    settings.validate()?;
    init_tracing(&settings)?;

    let (meter, task) = MeterHandle::spawn(&settings, SerialAdapter::from_settings(&settings));
    let mut events = meter.subscribe();
    meter
        .open()
        .await
        .with_context(|| format!("could not open {}", settings.port))?;
    info!(port = %settings.port, "Streaming meter events; Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                info!("Ctrl-C received");
                break;
            }
        }
    }

    meter.shutdown().await?;
    task.await?;
    Ok(())
}
