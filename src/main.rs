//! InfluxDB bridge for hardware sensor readings.
//!
//! Samples a local sensor value via lm-sensors and reports it to an
//! InfluxDB v2 bucket, retrying forever with randomized backoff.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use influx_bridge_sensors::config::BridgeConfig;
use influx_bridge_sensors::supervisor::Supervisor;

/// InfluxDB bridge for hardware sensor readings (lm-sensors).
#[derive(Parser, Debug)]
#[command(name = "influx-bridge-sensors")]
#[command(about = "Samples a local sensor value and reports it to InfluxDB")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "sensors.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration problems are the only fatal errors: abort before the
    // first session starts.
    let config = BridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut log_config = config.logging.clone();
    if let Some(level) = args.log_level.clone() {
        log_config.level = level;
    }
    influx_bridge_sensors::init_tracing(&log_config).context("Failed to init tracing")?;

    info!("Starting influx-bridge-sensors");
    info!("Loaded configuration from {:?}", args.config);
    info!(
        "Reporting '{}' for host '{}' every {}s to {}",
        config.influx.measurement,
        config.get_hostname(),
        config.report.interval_secs,
        config.influx.url
    );

    let supervisor = Supervisor::new(config);
    let mut task = tokio::spawn(supervisor.run());

    // The supervisor never returns on its own; run until an external signal
    // stops us. A join here means the task panicked, which is fatal.
    tokio::select! {
        result = &mut task => {
            result.context("Supervisor task terminated unexpectedly")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            task.abort();
        }
    }

    info!("Sensor bridge stopped");

    Ok(())
}
