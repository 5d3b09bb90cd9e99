use std::fmt;

/// Stream supervisor states (pure domain)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Not started, paused, or shut down
    Idle,
    /// Relay warm-up issued, waiting for the pre-start delay
    Warming,
    /// Transport started, waiting for the first frame
    Loading,
    /// Stream is delivering frames
    Active,
    /// Attempt failed, waiting out the backoff delay
    Retrying { attempt: u32 },
    /// Retry budget exhausted; recoverable via manual reconnect
    Failed,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Warming => write!(f, "WARMING"),
            Self::Loading => write!(f, "LOADING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Retrying { attempt } => write!(f, "RETRYING (attempt {})", attempt),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl SupervisorState {
    /// Convert state to numeric value for metrics
    pub fn as_metric(&self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Warming => 1.0,
            Self::Loading => 2.0,
            Self::Active => 3.0,
            Self::Retrying { .. } => 4.0,
            Self::Failed => 5.0,
        }
    }

    /// Check if the stream is delivering frames
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if state indicates a problem
    pub fn is_problematic(&self) -> bool {
        matches!(self, Self::Retrying { .. } | Self::Failed)
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::Idle
    }
}
