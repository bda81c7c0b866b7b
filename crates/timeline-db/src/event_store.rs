//! The durable event log.
//!
//! One row per event in the `events` table. The payload column holds the
//! JSON-encoded [`EventKind`], and the `kind` column repeats its tag so the
//! log can be inspected with plain SQL.

use sqlx::SqlitePool;
use timeline_events::EventLog;
use timeline_types::{EventKey, EventKind, GameEvent};

use crate::error::DbError;

/// [`EventLog`] backed by the `events` table.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of stored events.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn count(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Key of the most recent event, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails or
    /// [`DbError::CorruptRow`] for a negative key.
    pub async fn last_key(&self) -> Result<Option<EventKey>, DbError> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT seq, time FROM events ORDER BY time DESC, seq DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(seq, time)| decode_key(seq, time)).transpose()
    }

    async fn insert(&self, event: &GameEvent) -> Result<(), DbError> {
        let seq = i64::try_from(event.key.seq).map_err(|_err| DbError::KeyOutOfRange(event.key))?;
        let time =
            i64::try_from(event.key.time).map_err(|_err| DbError::KeyOutOfRange(event.key))?;
        let payload = serde_json::to_string(&event.kind)?;

        let mut tx = self.pool.begin().await?;

        let last: Option<(i64, i64)> =
            sqlx::query_as("SELECT seq, time FROM events ORDER BY time DESC, seq DESC LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?;
        if let Some((last_seq, last_time)) = last {
            let last = decode_key(last_seq, last_time)?;
            if event.key <= last || event.key.seq <= last.seq {
                return Err(DbError::OutOfOrder {
                    last,
                    next: event.key,
                });
            }
        }

        sqlx::query(
            r"INSERT INTO events (seq, time, kind, payload, created_at)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(seq)
        .bind(time)
        .bind(event.kind.name())
        .bind(&payload)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(key = %event.key, kind = event.kind.name(), "Appended event");
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<GameEvent>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT seq, time, kind, payload, created_at
              FROM events
              ORDER BY time, seq",
        )
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .into_iter()
            .map(EventRow::into_event)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = events.len(), "Loaded events");
        Ok(events)
    }
}

impl EventLog for SqliteEventStore {
    type Error = DbError;

    async fn append(&mut self, event: &GameEvent) -> Result<(), Self::Error> {
        self.insert(event).await
    }

    async fn load_ordered(&self) -> Result<Vec<GameEvent>, Self::Error> {
        self.fetch_all().await
    }
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Global sequence number.
    pub seq: i64,
    /// Unix milliseconds.
    pub time: i64,
    /// Kind tag.
    pub kind: String,
    /// JSON-encoded [`EventKind`].
    pub payload: String,
    /// Wall-clock creation time.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl EventRow {
    /// Decode the row into an event.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] for an undecodable payload,
    /// [`DbError::CorruptRow`] for a negative key, and
    /// [`DbError::KindMismatch`] when the tag and payload disagree.
    pub fn into_event(self) -> Result<GameEvent, DbError> {
        let key = decode_key(self.seq, self.time)?;
        let kind: EventKind = serde_json::from_str(&self.payload)?;
        if kind.name() != self.kind {
            return Err(DbError::KindMismatch {
                key,
                stored: self.kind,
                decoded: kind.name(),
            });
        }
        Ok(GameEvent {
            key,
            created_at: self.created_at,
            kind,
        })
    }
}

fn decode_key(seq: i64, time: i64) -> Result<EventKey, DbError> {
    Ok(EventKey {
        time: u64::try_from(time).map_err(|_err| DbError::CorruptRow(seq))?,
        seq: u64::try_from(seq).map_err(|_err| DbError::CorruptRow(seq))?,
    })
}
