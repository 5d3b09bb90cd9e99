use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::SupervisorState;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Supervisor state (0=Idle, 1=Warming, 2=Loading, 3=Active, 4=Retrying, 5=Failed)
    pub static ref SUPERVISOR_STATE: Gauge = Gauge::new(
        "stream_supervisor_state",
        "Current supervisor state"
    ).expect("metric can be created");

    // Total reconnection attempts
    pub static ref RECONNECT_ATTEMPTS: IntCounter = IntCounter::new(
        "reconnect_attempts_total",
        "Total number of reconnection attempts"
    ).expect("metric can be created");

    // Current backoff delay in seconds
    pub static ref BACKOFF_SECONDS: Gauge = Gauge::new(
        "reconnect_backoff_seconds",
        "Current reconnection backoff delay"
    ).expect("metric can be created");

    // Stream uptime
    pub static ref UPTIME_SECONDS: Gauge = Gauge::new(
        "stream_uptime_seconds",
        "Time since the stream first became active"
    ).expect("metric can be created");

    // Frame delivery state (0=stalled, 1=producing)
    pub static ref TRANSPORT_PRODUCING: IntGauge = IntGauge::new(
        "transport_producing",
        "Whether the transport is currently delivering frames"
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(SUPERVISOR_STATE.clone()))?;
        REGISTRY.register(Box::new(RECONNECT_ATTEMPTS.clone()))?;
        REGISTRY.register(Box::new(BACKOFF_SECONDS.clone()))?;
        REGISTRY.register(Box::new(UPTIME_SECONDS.clone()))?;
        REGISTRY.register(Box::new(TRANSPORT_PRODUCING.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_state_change(&self, state: &SupervisorState) {
        SUPERVISOR_STATE.set(state.as_metric());
    }

    fn report_reconnect_attempt(&self) {
        RECONNECT_ATTEMPTS.inc();
    }

    fn report_backoff(&self, delay_secs: f64) {
        BACKOFF_SECONDS.set(delay_secs);
    }

    fn report_producing(&self, producing: bool) {
        TRANSPORT_PRODUCING.set(if producing { 1 } else { 0 });
    }

    fn report_uptime(&self, uptime_secs: f64) {
        UPTIME_SECONDS.set(uptime_secs);
    }
}
