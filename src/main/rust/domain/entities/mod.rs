mod supervisor_lifecycle;

pub use supervisor_lifecycle::{StateTransition, SupervisorLifecycle};
