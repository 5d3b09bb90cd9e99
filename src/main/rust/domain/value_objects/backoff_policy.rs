use std::time::Duration;

use crate::domain::errors::{Result, WatchdogError};

/// Backoff configuration for stream retry attempts
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    max_retries: u32,
}

impl BackoffPolicy {
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        max_retries: u32,
    ) -> Result<Self> {
        if multiplier <= 1.0 {
            return Err(WatchdogError::InvalidBackoffMultiplier);
        }

        if initial_delay.is_zero() {
            return Err(WatchdogError::InvalidBackoffDelay(
                "initial delay cannot be zero".to_string(),
            ));
        }

        if max_delay < initial_delay {
            return Err(WatchdogError::InvalidBackoffDelay(format!(
                "max delay {:?} is below initial delay {:?}",
                max_delay, initial_delay
            )));
        }

        Ok(Self {
            initial_delay,
            max_delay,
            multiplier,
            max_retries,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Calculate the next backoff delay based on current delay
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = Duration::from_secs_f64(current.as_secs_f64() * self.multiplier);
        next.min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    /// Defaults match the stream watchdog behavior: 2s initial delay,
    /// 30s cap, 1.5x growth, 5 attempts before giving up.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 1.5,
            max_retries: 5,
        }
    }
}
