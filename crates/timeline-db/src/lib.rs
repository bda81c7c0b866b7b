//! Embedded persistence for the Timeline event log.
//!
//! Each save slot is a `SQLite` database holding a single append-only
//! `events` table. [`SqliteEventStore`] implements the
//! [`timeline_events::EventLog`] interface the session replays from and
//! appends to.
//!
//! # Modules
//!
//! - [`sqlite`] -- Connection pool, configuration, and migrations
//! - [`event_store`] -- The `events` table as an event log
//! - [`error`] -- Shared error types

pub mod error;
pub mod event_store;
pub mod sqlite;

pub use error::DbError;
pub use event_store::{EventRow, SqliteEventStore};
pub use sqlite::{MEMORY_URL, SqliteConfig, SqliteDb};
