use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("Invalid stream URL: {0}")]
    InvalidStreamUrl(String),

    #[error("Invalid relay URL: {0}")]
    InvalidRelayUrl(String),

    #[error("Invalid backoff multiplier: must be > 1.0")]
    InvalidBackoffMultiplier,

    #[error("Invalid backoff delay: {0}")]
    InvalidBackoffDelay(String),

    #[error("Relay request failed: {0}")]
    RelayRequestFailed(String),

    #[error("Relay returned status {0}")]
    RelayStatus(u16),

    #[error("Transport start failed: {0}")]
    TransportStartFailed(String),
}

pub type Result<T> = std::result::Result<T, WatchdogError>;
