//! Sensor acquisition via an external command.
//!
//! The sensor tool (lm-sensors by default) is treated as a black box: it is
//! invoked once per sample, its stdout is parsed as JSON5, and the configured
//! key path is walked down to a single numeric reading.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;

use crate::config::SensorConfig;

/// Error type for sensor acquisition.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("sensor command failed ({status}): {stderr}")]
    Command {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("failed to parse sensor output: {0}")]
    Parse(String),
    #[error("missing key '{0}' in sensor output")]
    MissingKey(String),
    #[error("value at '{0}' is not numeric")]
    NotNumeric(String),
}

/// A single sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Timestamp when the value was measured.
    pub timestamp: DateTime<Utc>,

    /// The numeric reading.
    pub value: f64,
}

/// Runs the configured sensor command and extracts the reading.
#[derive(Debug, Clone)]
pub struct SensorCommand {
    command: String,
    args: Vec<String>,
    access_path: Vec<String>,
}

impl SensorCommand {
    /// Create a sensor source from configuration.
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            access_path: config.access_path.clone(),
        }
    }

    /// Invoke the sensor command and extract one sample.
    pub async fn read(&self) -> Result<Sample, SensorError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .await
            .map_err(|source| SensorError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SensorError::Command {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // lm-sensors emits trailing commas in some versions, so parse as JSON5.
        let root: Value =
            json5::from_str(&stdout).map_err(|e| SensorError::Parse(e.to_string()))?;

        let value = extract_reading(&root, &self.access_path)?;

        Ok(Sample {
            timestamp: Utc::now(),
            value,
        })
    }
}

/// Walk `path` down a parsed document and coerce the leaf to f64.
///
/// Accepts JSON numbers and strings that parse as numbers; everything else
/// is a sensor failure.
pub fn extract_reading(root: &Value, path: &[String]) -> Result<f64, SensorError> {
    let mut current = root;
    for (depth, key) in path.iter().enumerate() {
        current = current
            .get(key)
            .ok_or_else(|| SensorError::MissingKey(path[..=depth].join("/")))?;
    }

    let location = || path.join("/");
    match current {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| SensorError::NotNumeric(location())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| SensorError::NotNumeric(location())),
        _ => Err(SensorError::NotNumeric(location())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_extract_nested_reading() {
        let root: Value = serde_json::json!({"a": {"b": 42.5}});
        assert_eq!(extract_reading(&root, &path(&["a", "b"])).unwrap(), 42.5);
    }

    #[test]
    fn test_extract_missing_key() {
        let root: Value = serde_json::json!({"a": {"b": 42.5}});
        let err = extract_reading(&root, &path(&["a", "c"])).unwrap_err();
        assert!(matches!(err, SensorError::MissingKey(ref k) if k == "a/c"));
    }

    #[test]
    fn test_extract_numeric_string() {
        let root: Value = serde_json::json!({"temp": "55.25"});
        assert_eq!(extract_reading(&root, &path(&["temp"])).unwrap(), 55.25);
    }

    #[test]
    fn test_extract_non_numeric_leaf() {
        let root: Value = serde_json::json!({"temp": "warm"});
        let err = extract_reading(&root, &path(&["temp"])).unwrap_err();
        assert!(matches!(err, SensorError::NotNumeric(_)));

        let root: Value = serde_json::json!({"temp": {"nested": 1.0}});
        let err = extract_reading(&root, &path(&["temp"])).unwrap_err();
        assert!(matches!(err, SensorError::NotNumeric(_)));
    }

    #[test]
    fn test_extract_lm_sensors_shape() {
        // Shape of `sensors -j` output on a typical desktop.
        let root: Value = serde_json::json!({
            "coretemp-isa-0000": {
                "Adapter": "ISA adapter",
                "Package id 0": {
                    "temp1_input": 48.0,
                    "temp1_max": 100.0,
                },
            },
        });
        let value = extract_reading(
            &root,
            &path(&["coretemp-isa-0000", "Package id 0", "temp1_input"]),
        )
        .unwrap();
        assert_eq!(value, 48.0);
    }

    #[tokio::test]
    async fn test_read_from_command() {
        let sensor = SensorCommand {
            command: "echo".to_string(),
            args: vec![r#"{"a": {"b": 1.5}}"#.to_string()],
            access_path: path(&["a", "b"]),
        };
        let sample = sensor.read().await.unwrap();
        assert_eq!(sample.value, 1.5);
    }

    #[tokio::test]
    async fn test_read_command_non_zero_exit() {
        let sensor = SensorCommand {
            command: "false".to_string(),
            args: vec![],
            access_path: path(&["a"]),
        };
        let err = sensor.read().await.unwrap_err();
        assert!(matches!(err, SensorError::Command { .. }));
    }

    #[tokio::test]
    async fn test_read_command_not_found() {
        let sensor = SensorCommand {
            command: "definitely-not-a-sensor-tool".to_string(),
            args: vec![],
            access_path: path(&["a"]),
        };
        let err = sensor.read().await.unwrap_err();
        assert!(matches!(err, SensorError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_read_unparsable_output() {
        let sensor = SensorCommand {
            command: "echo".to_string(),
            args: vec!["not json at all {{".to_string()],
            access_path: path(&["a"]),
        };
        let err = sensor.read().await.unwrap_err();
        assert!(matches!(err, SensorError::Parse(_)));
    }
}
