mod attention;
mod backoff_policy;
mod health;
mod retry_state;
mod stream_target;
mod supervisor_state;
mod timing;

pub use attention::{AttentionEdge, AttentionSignal, AttentionState, AttentionTracker};
pub use backoff_policy::BackoffPolicy;
pub use health::HealthSnapshot;
pub use retry_state::RetryState;
pub use stream_target::StreamTarget;
pub use supervisor_state::SupervisorState;
pub use timing::SupervisorTiming;
