/// Port for the view surface the supervisor drives.
///
/// Fire-and-forget; exactly one view is current at a time, matching the
/// supervisor state: Warming/Loading/Retrying map to loading, Active to
/// active, Failed to error.
pub trait ViewSink: Send + Sync {
    fn show_loading(&self);
    fn show_active(&self);
    fn show_error(&self);

    /// Idle presentation is implementation-defined; defaults to loading
    fn show_idle(&self) {
        self.show_loading();
    }
}
