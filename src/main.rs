// src/main.rs
//! GGA Monitor - follow an NMEA GGA stream over TCP

use anyhow::Context;
use clap::Parser;
use gga_monitor::{config::MonitorConfig, logging, GgaMonitor};
use std::path::PathBuf;
use tracing::{info, warn, Level};

#[derive(Debug, Parser)]
#[command(name = "gga-monitor", version, about = "Follow an NMEA GGA stream over TCP")]
struct Cli {
    /// Receiver host
    #[arg(long, env = "GGA_HOST")]
    host: Option<String>,

    /// Receiver port
    #[arg(short, long, env = "GGA_PORT")]
    port: Option<u16>,

    /// Drop the connection after this long without a line
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Wait between failed connection attempts
    #[arg(long)]
    retry_interval_ms: Option<u64>,

    /// Log events line by line instead of the full-screen display
    #[arg(long)]
    plain: bool,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save: bool,

    /// Config file to use instead of ~/.config/gga-monitor/config.json
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // the full-screen display would be scribbled over by routine logs
    logging::init_default_logging(if cli.plain { Level::INFO } else { Level::ERROR });

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => MonitorConfig::get_config_path()?,
    };
    let mut config = MonitorConfig::load_from(&config_path).unwrap_or_else(|e| {
        warn!(path = %config_path.display(), error = %e, "ignoring unreadable config");
        MonitorConfig::default()
    });

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ms) = cli.read_timeout_ms {
        config.read_timeout_ms = ms;
    }
    if let Some(ms) = cli.retry_interval_ms {
        config.retry_interval_ms = ms;
    }
    config.validate()?;

    if cli.save {
        config
            .save_to(&config_path)
            .with_context(|| format!("saving {}", config_path.display()))?;
        info!(path = %config_path.display(), "configuration saved");
    }

    let mut monitor = GgaMonitor::new();
    monitor.start(config.endpoint(), config.link_settings())?;

    if cli.plain {
        monitor.wait_for_shutdown().await?;
    } else {
        monitor.run_display().await?;
    }

    monitor.stop();
    Ok(())
}
