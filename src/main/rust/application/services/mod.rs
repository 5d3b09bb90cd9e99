mod supervisor_service;

pub use supervisor_service::{StreamSupervisor, SupervisorHandle, SupervisorOptions};
