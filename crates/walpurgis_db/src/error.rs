//! Error types for the archive store.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for store operations.
pub type DbResult<T> = Result<T, DbError>;

/// Archive store error types.
#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    /// SQLite/sqlx error
    #[error("Database error: {0}")]
    #[diagnostic(code(walpurgis_db::sqlx))]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(walpurgis_db::migration))]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization error (export/import)
    #[error("Serialization error: {0}")]
    #[diagnostic(code(walpurgis_db::serde))]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(walpurgis_db::io))]
    Io(#[from] std::io::Error),

    /// A different entry already owns this day.
    #[error("Day {day} is already archived.")]
    #[diagnostic(code(walpurgis_db::day_conflict))]
    DayConflict { day: i64 },

    /// All three media slots of the day are filled.
    #[error("Day {day} already has all of its media slots filled.")]
    #[diagnostic(
        code(walpurgis_db::slots_exceeded),
        help("Delete the day first if the media needs replacing")
    )]
    SlotsExceeded { day: i64 },

    /// Not enough free slots for every requested media item; nothing was placed.
    #[error("Day {day} only has {available} free media slots, but {requested} were supplied.")]
    #[diagnostic(code(walpurgis_db::no_available_slots))]
    NoAvailableSlots {
        day: i64,
        requested: usize,
        available: usize,
    },

    /// A bulk import record failed validation; the batch was not applied.
    #[error("Record {index} is malformed: {reason}")]
    #[diagnostic(
        code(walpurgis_db::malformed_record),
        help("Every record needs a positive day, a message id, a timestamp and 1-3 media refs")
    )]
    MalformedRecord { index: usize, reason: String },

    /// Invalid data
    #[error("Invalid data: {message}")]
    #[diagnostic(code(walpurgis_db::invalid_data))]
    InvalidData { message: String },
}

impl DbError {
    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a malformed record error.
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }

    /// Map a unique-key violation on insert to a day conflict, pass anything else through.
    pub(crate) fn from_insert(err: sqlx::Error, day: i64) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => Self::DayConflict { day },
            _ => Self::Sqlx(err),
        }
    }
}
