//! Bounded exponential-backoff retry policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
///
/// The delay before attempt `n + 1` (after `n` failures) is
/// `base_delay * backoff_factor^(n - 1)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds
    pub base_delay_ms: u64,
    /// Multiplier applied per subsequent failure
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            backoff_factor,
            max_delay_ms: 60_000,
        }
    }

    /// Policy for establishing backend connections.
    pub const fn connect() -> Self {
        Self::new(5, Duration::from_secs(1), 2.0)
    }

    /// Policy for a single store write.
    pub const fn store_write() -> Self {
        Self::new(3, Duration::from_millis(500), 2.0)
    }

    /// Policy that never waits; handy in tests.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1.0)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Attempts actually made; a zero cap still runs the operation once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after `failures` consecutive failures.
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exp = self.backoff_factor.max(1.0).powi(failures as i32 - 1);
        let ms = (self.base_delay_ms as f64 * exp).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::store_write()
    }
}
