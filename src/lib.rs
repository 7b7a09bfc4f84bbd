//! InfluxDB bridge for hardware sensor readings.
//!
//! Samples a local hardware sensor value on a fixed interval by invoking the
//! `sensors` utility, formats each reading as a time-series data point, and
//! writes it to an InfluxDB v2 bucket, continuing indefinitely across
//! transient failures.
//!
//! Two cooperating components, one control thread:
//!
//! - [`session::Session`] — owns one sink connection for its lifetime,
//!   paces reports to the configured interval, and ends at the first
//!   recoverable failure, reporting how long it ran.
//! - [`supervisor::Supervisor`] — restarts sessions forever, growing or
//!   resetting a randomized multiplicative backoff from each session's
//!   runtime.

pub mod config;
pub mod sensor;
pub mod session;
pub mod sink;
pub mod supervisor;

// Re-export commonly used types at the crate root
pub use config::{BridgeConfig, ConfigError, LoggingConfig};
pub use sensor::{Sample, SensorCommand, SensorError};
pub use session::{Sampler, Session, SessionError, Sink};
pub use sink::{InfluxSink, SinkError};
pub use supervisor::{Backoff, Supervisor};

/// Initialize tracing with the given configuration.
///
/// Diagnostics go to standard error, or are appended to the configured log
/// file when one is set. Every line carries a timestamp; there is no
/// rotation or size bound.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;

            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Arc::new(file)),
                )
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
    }

    Ok(())
}
