//! Database models.
//!
//! These structs map to the `daily_johans` table via sqlx.

mod entry;

pub use entry::{
    ArchiveEntry, ImportReport, MAX_MEDIA_SLOTS, NewArchive, UpsertOutcome, WriteMode,
    parse_import, render_export,
};

pub(crate) use entry::EntryRow;
