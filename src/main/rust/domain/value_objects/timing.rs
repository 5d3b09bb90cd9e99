use std::time::Duration;

/// Timer schedule for the supervisor loop.
///
/// The intervals are deliberately staggered: the self-check catches silent
/// stalls quickly, the health poll consults the relay, and the fallback is a
/// slow independent sweep in case both of the others miss a broken stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorTiming {
    /// Pre-start delay after a successful relay warm-up
    pub warm_delay_ok: Duration,
    /// Pre-start delay after a failed relay warm-up
    pub warm_delay_err: Duration,
    /// How long a start attempt may sit without a first frame
    pub load_timeout: Duration,
    /// Silent-stall check while the stream is active
    pub self_check_interval: Duration,
    /// Relay health poll cadence
    pub health_interval: Duration,
    /// Coarse independent liveness sweep
    pub fallback_interval: Duration,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            warm_delay_ok: Duration::from_millis(500),
            warm_delay_err: Duration::from_millis(1000),
            load_timeout: Duration::from_secs(20),
            self_check_interval: Duration::from_secs(10),
            health_interval: Duration::from_secs(45),
            fallback_interval: Duration::from_secs(120),
        }
    }
}
