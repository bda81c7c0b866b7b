//! The event log collaborator interface.

use std::future::Future;

use timeline_types::GameEvent;

/// An append-only, durable store of [`GameEvent`]s.
///
/// The simulation core never touches storage directly: it appends each
/// event before committing its transition, and on startup rebuilds all
/// state from [`EventLog::load_ordered`].
pub trait EventLog {
    /// Failure reported by the backing store.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Durably append one event.
    ///
    /// The future resolves only once the event is stored (or storing it
    /// failed). A failed append must leave the log unchanged.
    fn append(&mut self, event: &GameEvent) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Return every stored event in key order.
    fn load_ordered(&self) -> impl Future<Output = Result<Vec<GameEvent>, Self::Error>> + Send;
}
