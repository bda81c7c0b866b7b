//! Event key assignment.
//!
//! The clock hands out [`EventKey`]s whose `time` never goes backwards even
//! when the wall clock does, and whose `seq` strictly increases. Key order
//! is therefore commit order, which is what replay relies on.

use chrono::{DateTime, Utc};
use timeline_types::EventKey;

/// Errors that can occur while assigning or observing event keys.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClockError {
    /// The sequence counter would overflow.
    #[error("event sequence overflow: cannot advance beyond u64::MAX")]
    SequenceOverflow,

    /// An observed key does not come after the last observed key.
    #[error("event key {next} does not follow {previous}")]
    OutOfOrder {
        /// Last key observed.
        previous: EventKey,
        /// Offending key.
        next: EventKey,
    },
}

/// Monotonic event key source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventClock {
    last: Option<EventKey>,
}

impl EventClock {
    /// Create a clock that has observed no events.
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Return the key the next event would receive at wall time `now_ms`.
    ///
    /// The clock is not advanced; call [`EventClock::observe`] once the
    /// event is committed.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::SequenceOverflow`] if the sequence is exhausted.
    pub fn next_key(&self, now_ms: u64) -> Result<EventKey, ClockError> {
        match self.last {
            None => Ok(EventKey { time: now_ms, seq: 1 }),
            Some(last) => Ok(EventKey {
                time: now_ms.max(last.time),
                seq: last.seq.checked_add(1).ok_or(ClockError::SequenceOverflow)?,
            }),
        }
    }

    /// Record a committed or replayed key.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::OutOfOrder`] if `key` does not strictly follow
    /// the last observed key in both `seq` and overall order.
    pub fn observe(&mut self, key: EventKey) -> Result<(), ClockError> {
        if let Some(previous) = self.last {
            if key <= previous || key.seq <= previous.seq {
                return Err(ClockError::OutOfOrder {
                    previous,
                    next: key,
                });
            }
        }
        self.last = Some(key);
        Ok(())
    }

    /// Return the last observed key.
    pub const fn last(&self) -> Option<EventKey> {
        self.last
    }
}

/// Convert a wall-clock instant to the millisecond time used in keys.
///
/// Instants before the Unix epoch map to 0.
pub fn unix_millis(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp_millis()).unwrap_or(0)
}
