//! Error types for the event log.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] and [`serde_json`] errors.

use timeline_types::EventKey;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A migration failed.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An event payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event key does not fit the `INTEGER` columns.
    #[error("Event key out of range: {0}")]
    KeyOutOfRange(EventKey),

    /// A stored row holds a negative key component.
    #[error("Corrupt event row at seq {0}")]
    CorruptRow(i64),

    /// A stored row's kind column disagrees with its payload.
    #[error("Event {key} is stored as '{stored}' but decodes as '{decoded}'")]
    KindMismatch {
        /// Key of the row.
        key: EventKey,
        /// The `kind` column.
        stored: String,
        /// The payload's kind.
        decoded: &'static str,
    },

    /// An append does not come after the last stored event.
    #[error("Event {next} does not follow stored event {last}")]
    OutOfOrder {
        /// Last stored key.
        last: EventKey,
        /// Rejected key.
        next: EventKey,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
