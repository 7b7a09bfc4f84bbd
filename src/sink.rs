//! InfluxDB v2 sink.
//!
//! Thin wrapper around an [`influxdb2::Client`]: a health check at session
//! start stands in for connection setup (the client itself is lazy), then
//! each sample becomes one data point written to the configured bucket.

use futures::stream;
use influxdb2::Client;
use influxdb2::api::write::TimestampPrecision;
use influxdb2::models::DataPoint;
use thiserror::Error;
use tracing::debug;

use crate::config::InfluxConfig;
use crate::sensor::Sample;

/// Error type for sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("failed to build data point: {0}")]
    Point(String),
    #[error("write failed: {0}")]
    Write(String),
}

/// Sink writing samples to an InfluxDB v2 bucket.
pub struct InfluxSink {
    config: InfluxConfig,
    hostname: String,
    client: Option<Client>,
}

impl InfluxSink {
    /// Create a sink from configuration. No connection is made until
    /// [`InfluxSink::connect`].
    pub fn new(config: InfluxConfig, hostname: impl Into<String>) -> Self {
        Self {
            config,
            hostname: hostname.into(),
            client: None,
        }
    }

    /// Build the client and verify the server is reachable and healthy.
    pub async fn connect(&mut self) -> Result<(), SinkError> {
        let client = Client::new(&self.config.url, &self.config.org, &self.config.token);

        // /health answers 503 when the server is unhealthy, so an Ok
        // response means the endpoint, credentials and URL all resolved.
        client
            .health()
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;
        debug!("influxdb health check passed");

        self.client = Some(client);
        Ok(())
    }

    /// Write one sample as a data point.
    pub async fn write(&self, sample: &Sample) -> Result<(), SinkError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SinkError::Connection("not connected".to_string()))?;

        let point = DataPoint::builder(&self.config.measurement)
            .tag(&self.config.tag, &self.hostname)
            .field(&self.config.field, sample.value)
            .timestamp(sample.timestamp.timestamp_millis())
            .build()
            .map_err(|e| SinkError::Point(e.to_string()))?;

        client
            .write_with_precision(
                &self.config.bucket,
                stream::iter([point]),
                TimestampPrecision::Milliseconds,
            )
            .await
            .map_err(|e| SinkError::Write(e.to_string()))?;

        Ok(())
    }
}
