//! Walpurgis archive store
//!
//! SQLite-backed record of one archive entry per sequence day.
//!
//! # Architecture
//!
//! - **One row per day** - `day` is the primary key, so a day can never be archived twice
//! - **Three media slots** - filled in order, merged into on repeat archive calls
//! - **Origin message index** - a series post backs several days and is deleted as a unit
//!
//! # Usage
//!
//! ```rust,ignore
//! use walpurgis_db::ArchiveDb;
//!
//! let db = ArchiveDb::open("path/to/daily_johans.db").await?;
//! let entry = db.find_by_day(12).await?;
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod queries;

pub use connection::{ArchiveDb, DbStats};
pub use error::{DbError, DbResult};

pub use models::{
    ArchiveEntry, ImportReport, MAX_MEDIA_SLOTS, NewArchive, UpsertOutcome, WriteMode,
    parse_import, render_export,
};
