//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A JSON payload column could not be encoded or decoded.
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value does not map onto a known enum variant.
    #[error("Invalid value '{value}' in column {column}")]
    InvalidValue { column: &'static str, value: String },

    /// The run is already finished and its record is immutable.
    #[error("Pipeline run {id} is already finalized")]
    RunAlreadyFinalized { id: String },
}
