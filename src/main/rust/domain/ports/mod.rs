mod metrics_reporter;
mod relay_client;
mod stream_transport;
mod view_sink;

pub use metrics_reporter::MetricsReporter;
pub use relay_client::{RelayClient, RelayHealth, WarmupStatus};
pub use stream_transport::{StreamTransport, TransportEvent};
pub use view_sink::ViewSink;
