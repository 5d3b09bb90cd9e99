use std::time::Duration;

use super::BackoffPolicy;

/// Retry bookkeeping for one failure episode.
///
/// `count` is the number of transport starts issued since the last reset,
/// `delay` is the wait before the next scheduled retry. Both reset together
/// on a successful load or a manual reconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    count: u32,
    delay: Duration,
}

impl RetryState {
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            count: 0,
            delay: policy.initial_delay(),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a transport start attempt
    pub fn record_start(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Advance the delay for the next retry, applied once per wait
    pub fn advance_delay(&mut self, policy: &BackoffPolicy) {
        self.delay = policy.next_delay(self.delay);
    }

    /// True when the retry budget is spent and the next failure is terminal
    pub fn exhausted(&self, policy: &BackoffPolicy) -> bool {
        self.count >= policy.max_retries()
    }

    pub fn reset(&mut self, policy: &BackoffPolicy) {
        self.count = 0;
        self.delay = policy.initial_delay();
    }
}
