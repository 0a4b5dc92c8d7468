use chrono::TimeDelta;
use miette::Diagnostic;
use thiserror::Error;
use walpurgis_db::DbError;

use crate::transport::TransportError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, ArchiveError>;

/// Configuration-specific errors
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Everything that can stop an archive conversation or command.
///
/// None of these are fatal to the process; each is turned into a notice for
/// the conversation it came from.
#[derive(Error, Diagnostic, Debug)]
pub enum ArchiveError {
    #[error("No valid day number could be read from {input:?}")]
    #[diagnostic(
        code(walpurgis_core::parse),
        help("Reply with the day number, e.g. `12`")
    )]
    Parse { input: String },

    #[error("Found {numbers} day numbers but only {media} attachments")]
    #[diagnostic(
        code(walpurgis_core::ambiguity),
        help("Submit the post manually with an explicit day list")
    )]
    Ambiguity { numbers: usize, media: usize },

    #[error("Cooldown active: {} since the last archive, {} remaining", format_delta(*.elapsed), format_delta(*.remaining))]
    #[diagnostic(code(walpurgis_core::cooldown_active))]
    CooldownActive { elapsed: TimeDelta, remaining: TimeDelta },

    #[error("Day {day} is already archived by a different message")]
    #[diagnostic(
        code(walpurgis_core::day_conflict),
        help("Delete the existing day first if it is wrong")
    )]
    DayConflict { day: i64 },

    #[error("Day {day} already has all of its media slots filled")]
    #[diagnostic(code(walpurgis_core::slots_exceeded))]
    SlotsExceeded { day: i64 },

    #[error("Day {day} only has {available} free media slots, but {requested} were supplied")]
    #[diagnostic(code(walpurgis_core::no_available_slots))]
    NoAvailableSlots {
        day: i64,
        requested: usize,
        available: usize,
    },

    #[error("Import record {index} is malformed: {reason}")]
    #[diagnostic(code(walpurgis_core::malformed_record))]
    MalformedRecord { index: usize, reason: String },

    #[error("No reply arrived within {waited_secs}s")]
    #[diagnostic(code(walpurgis_core::transport_timeout))]
    TransportTimeout { waited_secs: u64 },

    #[error("Channel {channel_id} is unavailable: {reason}")]
    #[diagnostic(code(walpurgis_core::channel_unavailable))]
    ChannelUnavailable { channel_id: u64, reason: String },

    #[error("A backup scan is already running")]
    #[diagnostic(
        code(walpurgis_core::backup_running),
        help("Wait for it to finish or use /panic_stop")
    )]
    BackupAlreadyRunning,

    #[error("Incorrect password")]
    #[diagnostic(code(walpurgis_core::bad_password))]
    BadPassword,

    #[error("Not authorized to {action}")]
    #[diagnostic(code(walpurgis_core::not_authorized))]
    NotAuthorized { action: String },

    #[error("Invalid input: {message}")]
    #[diagnostic(code(walpurgis_core::invalid_input))]
    InvalidInput { message: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(walpurgis_core::config))]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(walpurgis_core::transport))]
    Transport(#[from] TransportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(DbError),
}

impl ArchiveError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn parse(input: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
        }
    }
}

/// Store integrity violations surface as their own variants; everything else stays a store error.
impl From<DbError> for ArchiveError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DayConflict { day } => Self::DayConflict { day },
            DbError::SlotsExceeded { day } => Self::SlotsExceeded { day },
            DbError::NoAvailableSlots {
                day,
                requested,
                available,
            } => Self::NoAvailableSlots {
                day,
                requested,
                available,
            },
            DbError::MalformedRecord { index, reason } => Self::MalformedRecord { index, reason },
            other => Self::Store(other),
        }
    }
}

/// Render a duration as `HHh MMm`, clamping negatives to zero.
pub fn format_delta(delta: TimeDelta) -> String {
    let minutes = delta.num_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflicts_are_translated() {
        let err: ArchiveError = DbError::DayConflict { day: 9 }.into();
        assert!(matches!(err, ArchiveError::DayConflict { day: 9 }));

        let err: ArchiveError = DbError::NoAvailableSlots {
            day: 2,
            requested: 3,
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            ArchiveError::NoAvailableSlots {
                day: 2,
                requested: 3,
                available: 1
            }
        ));

        let err: ArchiveError = DbError::invalid_data("bad").into();
        assert!(matches!(err, ArchiveError::Store(_)));
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(TimeDelta::minutes(61)), "1h 01m");
        assert_eq!(format_delta(TimeDelta::hours(11) + TimeDelta::minutes(59)), "11h 59m");
        assert_eq!(format_delta(TimeDelta::minutes(-5)), "0h 00m");
    }
}
