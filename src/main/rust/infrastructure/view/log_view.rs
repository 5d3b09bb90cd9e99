use tracing::info;

use crate::domain::ports::ViewSink;

/// View sink for headless deployments: state changes go to the log.
///
/// A GUI embedding supplies its own [`ViewSink`] that swaps panels instead.
pub struct LogView;

impl LogView {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogView {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewSink for LogView {
    fn show_loading(&self) {
        info!("View: loading");
    }

    fn show_active(&self) {
        info!("View: stream");
    }

    fn show_error(&self) {
        info!("View: error");
    }

    fn show_idle(&self) {
        info!("View: idle");
    }
}
