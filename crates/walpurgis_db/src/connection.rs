//! Database connection management.

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::DbResult;
use crate::models::{ArchiveEntry, ImportReport, NewArchive, UpsertOutcome, WriteMode};
use crate::queries;

/// Handle to the archive database.
///
/// Cheap to clone. Writes are serialized through a process-wide lock so each
/// store operation sees and leaves a consistent table, whichever conversation
/// issues it.
#[derive(Debug, Clone)]
pub struct ArchiveDb {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl ArchiveDb {
    /// Open or create an archive database at the given path.
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run any pending migrations
    /// 3. Configure SQLite for WAL mode
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening archive database: {}", path.to_string_lossy());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("synchronous", "NORMAL") // Safe with WAL
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(4) // SQLite is single-writer, but readers can parallelize
            .connect_with(options)
            .await?;

        debug!("Archive database connection established");

        Self::run_migrations(&pool).await?;

        Ok(Self::from_pool(pool))
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1) // In-memory must be single connection to share state
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        debug!("Running database migrations");
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the database is healthy.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get database statistics.
    pub async fn stats(&self) -> DbResult<DbStats> {
        Ok(DbStats {
            entry_count: queries::count_entries(&self.pool).await?,
            max_day: queries::get_max_day(&self.pool).await?,
        })
    }

    // ------------------------------------------------------------------------
    // Store contract
    // ------------------------------------------------------------------------

    /// Insert a day or merge media into it. See [`queries::upsert_entry`].
    pub async fn upsert(&self, new: &NewArchive) -> DbResult<UpsertOutcome> {
        let _guard = self.write_lock.lock().await;
        let outcome = queries::upsert_entry(&self.pool, new).await?;
        debug!(day = new.day, message_id = %new.origin_message_id, ?outcome, "Upserted archive entry");
        Ok(outcome)
    }

    /// Upsert under a policy for existing days. See [`queries::write_entry`].
    pub async fn upsert_with(&self, new: &NewArchive, mode: WriteMode) -> DbResult<UpsertOutcome> {
        let _guard = self.write_lock.lock().await;
        let outcome = queries::write_entry(&self.pool, new, mode).await?;
        debug!(day = new.day, message_id = %new.origin_message_id, ?mode, ?outcome, "Wrote archive entry");
        Ok(outcome)
    }

    pub async fn find_by_day(&self, day: i64) -> DbResult<Option<ArchiveEntry>> {
        queries::get_entry(&self.pool, day).await
    }

    /// All entries backed by a message; a series post backs several days.
    pub async fn find_by_message(&self, message_id: &str) -> DbResult<Vec<ArchiveEntry>> {
        queries::get_entries_by_message(&self.pool, message_id).await
    }

    pub async fn delete_by_day(&self, day: i64) -> DbResult<bool> {
        let _guard = self.write_lock.lock().await;
        queries::delete_entry(&self.pool, day).await
    }

    /// Remove every entry whose origin is the message. Returns the number removed.
    pub async fn delete_by_message(&self, message_id: &str) -> DbResult<u64> {
        let _guard = self.write_lock.lock().await;
        let removed = queries::delete_entries_by_message(&self.pool, message_id).await?;
        info!(message_id, removed, "Deleted archive entries by message");
        Ok(removed)
    }

    /// Insert entries for absent days, skipping existing ones. Validation is all or nothing.
    pub async fn bulk_import(&self, entries: &[ArchiveEntry]) -> DbResult<ImportReport> {
        let _guard = self.write_lock.lock().await;
        let report = queries::import_entries(&self.pool, entries).await?;
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Bulk import complete"
        );
        Ok(report)
    }

    pub async fn export_all(&self) -> DbResult<Vec<ArchiveEntry>> {
        queries::list_entries(&self.pool).await
    }

    pub async fn max_day(&self) -> DbResult<Option<i64>> {
        queries::get_max_day(&self.pool).await
    }

    pub async fn latest(&self) -> DbResult<Option<ArchiveEntry>> {
        queries::get_latest_entry(&self.pool).await
    }

    pub async fn days_in_range(&self, start: i64, end: i64) -> DbResult<Vec<i64>> {
        queries::get_days_in_range(&self.pool, start, end).await
    }
}

/// Database statistics.
#[derive(Debug, Clone)]
pub struct DbStats {
    pub entry_count: i64,
    pub max_day: Option<i64>,
}

impl DbStats {
    /// Days below the highest archived day that have no entry.
    pub fn missing_days(&self) -> i64 {
        self.max_day
            .map(|max| (max - self.entry_count).max(0))
            .unwrap_or(0)
    }
}
