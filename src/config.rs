//! Configuration for the sensor bridge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// InfluxDB connection and data point settings.
    pub influx: InfluxConfig,

    /// Sensor acquisition settings.
    pub sensor: SensorConfig,

    /// Reporting cadence and backoff settings.
    pub report: ReportConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// InfluxDB v2 connection settings and data point naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Server URL (e.g., "http://localhost:8086").
    pub url: String,

    /// Organization name.
    pub org: String,

    /// API access token.
    pub token: String,

    /// Target bucket.
    pub bucket: String,

    /// Measurement name (default: "cpu_temp").
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Field name for the reading (default: "temp").
    #[serde(default = "default_field")]
    pub field: String,

    /// Tag key carrying the reporting host identity (default: "server").
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_measurement() -> String {
    "cpu_temp".to_string()
}

fn default_field() -> String {
    "temp".to_string()
}

fn default_tag() -> String {
    "server".to_string()
}

/// Sensor acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// External command producing structured sensor output (default: "sensors").
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments passed to the command (default: ["-j"]).
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Sequence of keys locating the numeric reading inside the command's
    /// JSON output, e.g. ["coretemp-isa-0000", "Package id 0", "temp1_input"].
    pub access_path: Vec<String>,

    /// Host identity reported in the data point tag.
    /// Use "auto" to detect automatically (default).
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

fn default_command() -> String {
    "sensors".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-j".to_string()]
}

fn default_hostname() -> String {
    "auto".to_string()
}

/// Reporting cadence and backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Sampling interval in seconds.
    pub interval_secs: f64,

    /// Upper bound on the backoff delay between sessions, in seconds.
    pub back_off_max_interval_secs: f64,

    /// Emit an info line for every successful report (default: false).
    #[serde(default)]
    pub log_success: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append diagnostics to this file instead of standard error.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.report.interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ConfigError::Validation(
                "interval_secs must be > 0".to_string(),
            ));
        }

        // The backoff multiplier never drops below 2.0, so the cap must
        // admit at least the base delay of two intervals.
        let max_backoff = self.report.back_off_max_interval_secs;
        if !max_backoff.is_finite() || max_backoff < 2.0 * interval {
            return Err(ConfigError::Validation(
                "back_off_max_interval_secs must be >= 2 * interval_secs".to_string(),
            ));
        }

        if self.sensor.command.is_empty() {
            return Err(ConfigError::Validation(
                "sensor command must not be empty".to_string(),
            ));
        }

        if self.sensor.access_path.is_empty() {
            return Err(ConfigError::Validation(
                "access_path must contain at least one key".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the host identity to report, resolving "auto" if needed.
    pub fn get_hostname(&self) -> String {
        if self.sensor.hostname == "auto" {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            self.sensor.hostname.clone()
        }
    }
}
