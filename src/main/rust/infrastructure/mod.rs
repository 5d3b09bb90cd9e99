pub mod metrics;
pub mod relay;
pub mod transport;
pub mod view;
