//! Service configuration.

use std::time::Duration;

use tracing::warn;

use ringd_executor::DEFAULT_POLL_INTERVAL_MS;

/// Environment variable overriding the engine poll interval, in milliseconds.
pub const POLL_INTERVAL_ENV: &str = "RINGD_POLL_INTERVAL_MS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    /// How often the engine's event loop is pumped on the worker thread.
    /// Lower values reduce event latency at the cost of CPU.
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl ServiceConfig {
    /// Load config from environment variables
    /// Set RINGD_POLL_INTERVAL_MS=20
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.poll_interval = Duration::from_millis(ms),
                _ => warn!(
                    "Ignoring {}={:?}, using {}ms",
                    POLL_INTERVAL_ENV, raw, DEFAULT_POLL_INTERVAL_MS
                ),
            }
        }

        config
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
