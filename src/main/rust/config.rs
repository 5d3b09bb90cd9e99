use std::time::Duration;

use clap::Parser;

use crate::domain::value_objects::{BackoffPolicy, StreamTarget, SupervisorTiming};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "stream-watchdog",
    version = "0.1.0",
    about = "Resilient stream connection supervisor with attention-gated reconnection"
)]
pub struct Config {
    /// Stream URL (the relay's MJPEG proxy endpoint)
    #[arg(
        long,
        env = "STREAM_URL",
        default_value = "http://localhost:8443/relay/stream_proxy?host=cam1&port=8080"
    )]
    pub stream_url: String,

    /// Relay control-plane base URL (warm-up and health endpoints)
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:8443/relay/")]
    pub relay_url: String,

    /// Metrics server port
    #[arg(long, env = "METRICS_PORT", default_value = "9003")]
    pub metrics_port: u16,

    /// Initial retry delay in milliseconds
    #[arg(long, default_value = "2000")]
    pub retry_initial_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    #[arg(long, default_value = "30000")]
    pub retry_max_delay_ms: u64,

    /// Retry backoff multiplier
    #[arg(long, default_value = "1.5")]
    pub retry_multiplier: f64,

    /// Attempts before giving up and surfacing the error view
    #[arg(long, default_value = "5")]
    pub max_retries: u32,

    /// How long a start attempt may wait for its first frame, in seconds
    #[arg(long, default_value = "20")]
    pub load_timeout_secs: u64,

    /// How long without frames before the stream counts as stalled, in seconds
    #[arg(long, default_value = "10")]
    pub stall_window_secs: u64,

    /// Tear the stream down when attention is lost instead of leaving it running
    #[arg(long)]
    pub pause_when_hidden: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.stream_url.starts_with("http://") && !self.stream_url.starts_with("https://") {
            anyhow::bail!("Stream URL must start with http:// or https://");
        }

        if !self.relay_url.starts_with("http://") && !self.relay_url.starts_with("https://") {
            anyhow::bail!("Relay URL must start with http:// or https://");
        }

        Self::validate_port(self.metrics_port, "metrics")?;

        if self.retry_multiplier <= 1.0 {
            anyhow::bail!("Retry multiplier must be > 1.0");
        }

        if self.retry_initial_delay_ms == 0 {
            anyhow::bail!("Initial retry delay cannot be 0");
        }

        if self.retry_max_delay_ms < self.retry_initial_delay_ms {
            anyhow::bail!(
                "Maximum retry delay ({}) cannot be less than initial delay ({})",
                self.retry_max_delay_ms,
                self.retry_initial_delay_ms
            );
        }

        if self.load_timeout_secs == 0 {
            anyhow::bail!("Load timeout cannot be 0");
        }

        if self.stall_window_secs == 0 {
            anyhow::bail!("Stall window cannot be 0");
        }

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    pub fn to_stream_target(&self) -> crate::domain::errors::Result<StreamTarget> {
        StreamTarget::new(&self.stream_url)
    }

    pub fn to_backoff_policy(&self) -> crate::domain::errors::Result<BackoffPolicy> {
        BackoffPolicy::new(
            Duration::from_millis(self.retry_initial_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
            self.retry_multiplier,
            self.max_retries,
        )
    }

    pub fn to_timing(&self) -> SupervisorTiming {
        SupervisorTiming {
            load_timeout: Duration::from_secs(self.load_timeout_secs),
            ..SupervisorTiming::default()
        }
    }

    pub fn stall_window(&self) -> Duration {
        Duration::from_secs(self.stall_window_secs)
    }
}
