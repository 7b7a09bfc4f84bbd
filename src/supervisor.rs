//! Backoff supervision across sessions.
//!
//! The supervisor wraps the session runner in an infinite loop: after each
//! session ends it decides, from how long the session ran, whether to reset
//! or grow a backoff delay, sleeps that delay, and starts a fresh session.

use std::time::Duration;

use rand::Rng;
use tokio::time;
use tracing::info;

use crate::config::BridgeConfig;
use crate::sensor::SensorCommand;
use crate::session::Session;
use crate::sink::InfluxSink;

/// Base value of the backoff multiplier.
const BASE_SKIP: f64 = 2.0;

/// Multiplicative backoff state carried across sessions.
///
/// The delay before the next session is `skip * interval`. A session that
/// outlives the current delay window resets `skip` to its base; a quick
/// failure raises `skip` to a random power drawn uniformly from `[1, 2]`,
/// clamped so the delay never exceeds the configured maximum.
#[derive(Debug)]
pub struct Backoff {
    skip: f64,
    interval_secs: f64,
    max_delay_secs: f64,
}

impl Backoff {
    /// Create backoff state with the multiplier at its base value.
    ///
    /// Config validation guarantees `max_delay_secs >= 2 * interval_secs`,
    /// so the clamp can never push the multiplier below its base.
    pub fn new(interval_secs: f64, max_delay_secs: f64) -> Self {
        Self {
            skip: BASE_SKIP,
            interval_secs,
            max_delay_secs,
        }
    }

    /// Current backoff multiplier.
    pub fn skip(&self) -> f64 {
        self.skip
    }

    /// Account for one finished session and return the delay to sleep
    /// before the next one.
    pub fn next_delay<R: Rng>(&mut self, runtime: Duration, rng: &mut R) -> Duration {
        if runtime.as_secs_f64() > self.skip * self.interval_secs {
            // Healthy enough: the failure was an isolated blip.
            self.skip = BASE_SKIP;
        } else {
            let exponent = rng.gen_range(1.0..=2.0);
            let ceiling = self.max_delay_secs / self.interval_secs;
            self.skip = self.skip.powf(exponent).min(ceiling);
        }

        Duration::from_secs_f64(self.skip * self.interval_secs)
    }
}

/// Runs sessions forever with backoff between them.
pub struct Supervisor {
    config: BridgeConfig,
    hostname: String,
}

impl Supervisor {
    /// Create a supervisor from validated configuration.
    pub fn new(config: BridgeConfig) -> Self {
        let hostname = config.get_hostname();
        Self { config, hostname }
    }

    /// Run the supervision loop. Never returns under normal operation;
    /// the process is expected to be terminated externally.
    pub async fn run(self) {
        let interval = Duration::from_secs_f64(self.config.report.interval_secs);
        let mut backoff = Backoff::new(
            self.config.report.interval_secs,
            self.config.report.back_off_max_interval_secs,
        );

        loop {
            let sampler = SensorCommand::new(&self.config.sensor);
            let sink = InfluxSink::new(self.config.influx.clone(), self.hostname.clone());
            let session = Session::new(
                sampler,
                sink,
                interval,
                self.hostname.clone(),
                self.config.report.log_success,
            );

            let runtime = session.run().await;

            let delay = backoff.next_delay(runtime, &mut rand::thread_rng());
            info!(
                "session ran for {:.1}s, backoff time: {:.3} seconds",
                runtime.as_secs_f64(),
                delay.as_secs_f64()
            );
            time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const INTERVAL: f64 = 5.0;
    const MAX_DELAY: f64 = 600.0;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_immediate_failure_grows_backoff() {
        let mut backoff = Backoff::new(INTERVAL, MAX_DELAY);
        let mut rng = rng();

        let delay = backoff.next_delay(Duration::ZERO, &mut rng);
        assert!(backoff.skip() > BASE_SKIP);
        // skip^u for u in [1, 2] lands in [skip, skip^2]
        assert!(backoff.skip() <= BASE_SKIP * BASE_SKIP);
        assert!((delay.as_secs_f64() - backoff.skip() * INTERVAL).abs() < 1e-6);
    }

    #[test]
    fn test_healthy_runtime_resets_backoff() {
        let mut backoff = Backoff::new(INTERVAL, MAX_DELAY);
        let mut rng = rng();

        for _ in 0..3 {
            backoff.next_delay(Duration::ZERO, &mut rng);
        }
        assert!(backoff.skip() > BASE_SKIP);

        // Runtime beyond the current window means the session was healthy.
        let window = backoff.skip() * INTERVAL;
        let delay = backoff.next_delay(Duration::from_secs_f64(window + 1.0), &mut rng);
        assert_eq!(backoff.skip(), BASE_SKIP);
        assert_eq!(delay.as_secs_f64(), BASE_SKIP * INTERVAL);
    }

    #[test]
    fn test_runtime_at_window_boundary_still_grows() {
        let mut backoff = Backoff::new(INTERVAL, MAX_DELAY);
        let mut rng = rng();

        // Exactly the window does not exceed it.
        let window = backoff.skip() * INTERVAL;
        backoff.next_delay(Duration::from_secs_f64(window), &mut rng);
        assert!(backoff.skip() > BASE_SKIP);
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        let mut backoff = Backoff::new(INTERVAL, MAX_DELAY);
        let mut rng = rng();

        let mut previous = 0.0;
        for _ in 0..50 {
            let delay = backoff.next_delay(Duration::ZERO, &mut rng).as_secs_f64();
            assert!(backoff.skip() >= BASE_SKIP);
            assert!(delay <= MAX_DELAY + 1e-9);
            assert!(delay >= previous);
            previous = delay;
        }

        // Repeated immediate failures pin the delay to the cap.
        assert!((previous - MAX_DELAY).abs() < 1e-6);
    }

    #[test]
    fn test_multiplier_never_drops_below_base() {
        // Tightest cap that validation admits: exactly two intervals.
        let mut backoff = Backoff::new(INTERVAL, 2.0 * INTERVAL);
        let mut rng = rng();

        for _ in 0..10 {
            let delay = backoff.next_delay(Duration::ZERO, &mut rng);
            assert_eq!(backoff.skip(), BASE_SKIP);
            assert_eq!(delay.as_secs_f64(), 2.0 * INTERVAL);
        }
    }
}
