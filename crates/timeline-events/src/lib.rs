//! Event ordering and the event log interface for the Timeline simulation.
//!
//! Every state change is an immutable [`GameEvent`] appended to an event
//! log. Events are the source of truth: all branch state is reconstructed
//! by replaying them in key order from an empty state.
//!
//! # Modules
//!
//! - [`clock`] -- [`EventClock`], which assigns strictly ordered keys
//! - [`log`] -- the [`EventLog`] trait implemented by storage backends
//! - [`memory`] -- [`MemoryEventLog`], a vector-backed implementation
//!
//! [`GameEvent`]: timeline_types::GameEvent

pub mod clock;
pub mod log;
pub mod memory;

pub use clock::{ClockError, EventClock, unix_millis};
pub use log::EventLog;
pub use memory::{MemoryEventLog, MemoryLogError};
