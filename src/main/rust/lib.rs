pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{StreamSupervisor, SupervisorHandle, SupervisorOptions};
pub use config::Config;
pub use domain::entities::{StateTransition, SupervisorLifecycle};
pub use domain::errors::{Result, WatchdogError};
pub use domain::ports::{
    MetricsReporter, RelayClient, RelayHealth, StreamTransport, TransportEvent, ViewSink,
    WarmupStatus,
};
pub use domain::value_objects::{
    AttentionEdge, AttentionSignal, AttentionState, AttentionTracker, BackoffPolicy,
    HealthSnapshot, RetryState, StreamTarget, SupervisorState, SupervisorTiming,
};
pub use infrastructure::metrics::PrometheusReporter;
pub use infrastructure::relay::HttpRelayClient;
pub use infrastructure::transport::MjpegTransport;
pub use infrastructure::view::LogView;
