//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and serving.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: timeline_core::ConfigError,
    },

    /// Content documents failed to load or validate.
    #[error("content error: {source}")]
    Content {
        /// The underlying content error.
        #[from]
        source: timeline_core::ContentError,
    },

    /// Preparing the save directory failed.
    #[error("save slot error: {source}")]
    SaveSlot {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Database connection or migration failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: timeline_db::DbError,
    },

    /// Replaying or bootstrapping the session failed.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: timeline_core::SessionError,
    },

    /// The observer server failed to start or stopped with an error.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: timeline_observer::ServerError,
    },
}
