//! One reporting session against the sink.
//!
//! A session owns one sink connection for its lifetime: it repeatedly
//! acquires a sample, paces itself to the configured interval, and writes
//! the sample to the sink. The first recoverable failure of any kind ends
//! the session; what survives to the caller is how long it ran successfully.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};

use crate::sensor::{Sample, SensorCommand, SensorError};
use crate::sink::{InfluxSink, SinkError};

/// Failure classes that end a session.
///
/// None of these are fatal to the process: the supervisor converts the
/// session's runtime into a backoff delay and starts a new session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Sink unreachable or credentials rejected at session start.
    #[error(transparent)]
    Connection(SinkError),
    /// Sensor command execution or output extraction failed.
    #[error(transparent)]
    Sensor(SensorError),
    /// The sink rejected a data point mid-session.
    #[error(transparent)]
    Sink(SinkError),
}

/// Source of samples for a session.
#[async_trait]
pub trait Sampler: Send {
    /// Acquire one sample.
    async fn acquire(&mut self) -> Result<Sample, SensorError>;
}

/// Destination for samples.
#[async_trait]
pub trait Sink: Send {
    /// Establish the connection used for the rest of the session.
    async fn connect(&mut self) -> Result<(), SinkError>;

    /// Write one sample.
    async fn write(&mut self, sample: &Sample) -> Result<(), SinkError>;
}

#[async_trait]
impl Sampler for SensorCommand {
    async fn acquire(&mut self) -> Result<Sample, SensorError> {
        self.read().await
    }
}

#[async_trait]
impl Sink for InfluxSink {
    async fn connect(&mut self) -> Result<(), SinkError> {
        InfluxSink::connect(self).await
    }

    async fn write(&mut self, sample: &Sample) -> Result<(), SinkError> {
        InfluxSink::write(self, sample).await
    }
}

/// One connected reporting session.
pub struct Session<S, K> {
    sampler: S,
    sink: K,
    interval: Duration,
    host: String,
    log_success: bool,
}

impl<S: Sampler, K: Sink> Session<S, K> {
    /// Create a session. Nothing runs until [`Session::run`].
    pub fn new(
        sampler: S,
        sink: K,
        interval: Duration,
        host: impl Into<String>,
        log_success: bool,
    ) -> Self {
        Self {
            sampler,
            sink,
            interval,
            host: host.into(),
            log_success,
        }
    }

    /// Run the session until its first failure.
    ///
    /// Returns the time from session start to the last successful report,
    /// or zero if nothing was reported. The failure itself is logged here;
    /// only the timing signal propagates to the supervisor.
    pub async fn run(mut self) -> Duration {
        let started = Instant::now();
        let mut last_report: Option<Instant> = None;

        let err = self.drive(&mut last_report).await;
        match &err {
            SessionError::Connection(e) => warn!("influxdb connection failed: {}", e),
            SessionError::Sensor(e) => error!("failed to read sensor data: {}", e),
            SessionError::Sink(e) => error!("failed to write sensor data to influxdb: {}", e),
        }

        last_report
            .map(|at| at.duration_since(started))
            .unwrap_or(Duration::ZERO)
    }

    /// The session loop. Has no success exit; it only returns the failure
    /// that ended the session.
    async fn drive(&mut self, last_report: &mut Option<Instant>) -> SessionError {
        if let Err(e) = self.sink.connect().await {
            return SessionError::Connection(e);
        }

        loop {
            let sample = match self.sampler.acquire().await {
                Ok(sample) => sample,
                Err(e) => return SessionError::Sensor(e),
            };

            // Pace to the configured cadence. Sleeping only the remainder of
            // the interval keeps successive reports `interval` apart however
            // long acquisition and the previous write took. First report
            // goes out immediately.
            if let Some(previous) = *last_report {
                let since = previous.elapsed();
                if since < self.interval {
                    time::sleep(self.interval - since).await;
                }
            }

            // Stamp before the write so pacing is unaffected by write
            // latency, but commit the stamp only once the write succeeds.
            let report_at = Instant::now();
            if let Err(e) = self.sink.write(&sample).await {
                return SessionError::Sink(e);
            }
            *last_report = Some(report_at);

            if self.log_success {
                info!(
                    "reported sensor reading {} for host '{}'",
                    sample.value, self.host
                );
            }
        }
    }
}
