use url::Url;

use crate::domain::errors::Result;

/// Asynchronous events delivered by a transport to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection produced its first frame
    Loaded,
    /// The connection errored or ended
    Failed { reason: String },
}

/// Port for the opaque media connection.
///
/// Implementations deliver [`TransportEvent`]s over the channel handed to
/// them at construction. `start` supersedes any previous connection; a
/// superseded connection must not emit further events.
pub trait StreamTransport: Send {
    /// Open a connection to the given per-attempt URL
    fn start(&mut self, url: Url) -> Result<()>;

    /// Tear down the current connection, if any
    fn stop(&mut self);

    /// Whether frames arrived recently enough to call the stream live
    fn is_producing_frames(&self) -> bool;
}
