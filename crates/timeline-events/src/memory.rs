//! In-memory [`EventLog`] used by tests and throwaway sessions.

use timeline_types::{EventKey, GameEvent};

use crate::log::EventLog;

/// Errors reported by [`MemoryEventLog`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemoryLogError {
    /// Appends were switched off with [`MemoryEventLog::set_fail_appends`].
    #[error("append rejected for event {0}")]
    Rejected(EventKey),

    /// The event does not come after the last stored event.
    #[error("event {next} does not follow stored event {last}")]
    OutOfOrder {
        /// Last stored key.
        last: EventKey,
        /// Offending key.
        next: EventKey,
    },
}

/// A vector-backed event log.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    events: Vec<GameEvent>,
    fail_appends: bool,
}

impl MemoryEventLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            fail_appends: false,
        }
    }

    /// Create a log pre-filled with events (sorted by key).
    pub fn from_events(mut events: Vec<GameEvent>) -> Self {
        events.sort_by_key(|e| e.key);
        Self {
            events,
            fail_appends: false,
        }
    }

    /// Make every subsequent append fail (or succeed again).
    pub const fn set_fail_appends(&mut self, fail: bool) {
        self.fail_appends = fail;
    }

    /// Stored events in key order.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventLog for MemoryEventLog {
    type Error = MemoryLogError;

    async fn append(&mut self, event: &GameEvent) -> Result<(), Self::Error> {
        if self.fail_appends {
            tracing::warn!(key = %event.key, "memory log rejecting append");
            return Err(MemoryLogError::Rejected(event.key));
        }
        if let Some(last) = self.events.last() {
            if event.key <= last.key {
                return Err(MemoryLogError::OutOfOrder {
                    last: last.key,
                    next: event.key,
                });
            }
        }
        self.events.push(event.clone());
        Ok(())
    }

    async fn load_ordered(&self) -> Result<Vec<GameEvent>, Self::Error> {
        Ok(self.events.clone())
    }
}
