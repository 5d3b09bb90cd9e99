use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::errors::Result;

/// Warm-up response payload from the relay
#[derive(Debug, Clone, Deserialize)]
pub struct WarmupStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub has_last_frame: bool,
}

/// Health response payload from the relay; unknown fields are ignored
#[derive(Debug, Clone, Deserialize)]
pub struct RelayHealth {
    pub active_relays: u32,
}

/// Port for the relay's control-plane endpoints.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Ask the relay to prepare resources for the stream identified by
    /// `query` before the first connect. Best effort; errors are non-fatal.
    async fn warm_up(&self, query: &str) -> Result<WarmupStatus>;

    /// Fetch relay-wide health
    async fn health(&self) -> Result<RelayHealth>;
}
