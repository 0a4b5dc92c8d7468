//! Archive entry queries.

use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use crate::models::{
    ArchiveEntry, EntryRow, ImportReport, MAX_MEDIA_SLOTS, NewArchive, UpsertOutcome,
    WriteMode,
};

macro_rules! select_entries {
    ($tail:literal) => {
        concat!(
            "SELECT day, message_id, channel_id, user_id, username, ",
            "media_url1, media_url2, media_url3, timestamp, confirmed ",
            "FROM daily_johans ",
            $tail
        )
    };
}

fn collect_entries(rows: Vec<EntryRow>) -> DbResult<Vec<ArchiveEntry>> {
    rows.into_iter().map(EntryRow::into_entry).collect()
}

/// Drop blank refs and repeats while keeping first-seen order.
fn dedup_media(media: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(media.len());
    for m in media {
        let m = m.trim();
        if !m.is_empty() && !out.iter().any(|o| o == m) {
            out.push(m.to_string());
        }
    }
    out
}

fn slot(media: &[String], index: usize) -> Option<&str> {
    media.get(index).map(String::as_str)
}

// ============================================================================
// Reads
// ============================================================================

/// Get the entry for a day.
pub async fn get_entry(pool: &SqlitePool, day: i64) -> DbResult<Option<ArchiveEntry>> {
    let row = sqlx::query_as::<_, EntryRow>(select_entries!("WHERE day = ?"))
        .bind(day)
        .fetch_optional(pool)
        .await?;
    row.map(EntryRow::into_entry).transpose()
}

/// Get every entry backed by a message, ordered by day.
pub async fn get_entries_by_message(
    pool: &SqlitePool,
    message_id: &str,
) -> DbResult<Vec<ArchiveEntry>> {
    let rows = sqlx::query_as::<_, EntryRow>(select_entries!(
        "WHERE message_id = ? ORDER BY day ASC"
    ))
    .bind(message_id)
    .fetch_all(pool)
    .await?;
    collect_entries(rows)
}

/// Get the entry with the highest day.
pub async fn get_latest_entry(pool: &SqlitePool) -> DbResult<Option<ArchiveEntry>> {
    let row = sqlx::query_as::<_, EntryRow>(select_entries!("ORDER BY day DESC LIMIT 1"))
        .fetch_optional(pool)
        .await?;
    row.map(EntryRow::into_entry).transpose()
}

/// Highest archived day, if any.
pub async fn get_max_day(pool: &SqlitePool) -> DbResult<Option<i64>> {
    let max = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(day) FROM daily_johans")
        .fetch_one(pool)
        .await?;
    Ok(max)
}

/// Number of archived days.
pub async fn count_entries(pool: &SqlitePool) -> DbResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM daily_johans")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Archived days within `[start, end]`, ascending.
pub async fn get_days_in_range(pool: &SqlitePool, start: i64, end: i64) -> DbResult<Vec<i64>> {
    let days = sqlx::query_scalar::<_, i64>(
        "SELECT day FROM daily_johans WHERE day BETWEEN ? AND ? ORDER BY day ASC",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(days)
}

/// Every entry, ordered by day.
pub async fn list_entries(pool: &SqlitePool) -> DbResult<Vec<ArchiveEntry>> {
    let rows = sqlx::query_as::<_, EntryRow>(select_entries!("ORDER BY day ASC"))
        .fetch_all(pool)
        .await?;
    collect_entries(rows)
}

// ============================================================================
// Writes
// ============================================================================

/// Insert a day or merge media into its free slots.
///
/// An absent day is inserted with the given media. A present day gets the
/// media refs it does not already hold placed into its free slots, in input
/// order, and its provenance and timestamp overwritten. Placement is all or
/// nothing: `SlotsExceeded` when the day is full and new media was supplied,
/// `NoAvailableSlots` when only some of it would fit.
pub async fn upsert_entry(pool: &SqlitePool, new: &NewArchive) -> DbResult<UpsertOutcome> {
    write_entry(pool, new, WriteMode::Merge).await
}

/// [`upsert_entry`] with a policy for days that already exist.
///
/// The ownership check and the write share one transaction.
pub async fn write_entry(
    pool: &SqlitePool,
    new: &NewArchive,
    mode: WriteMode,
) -> DbResult<UpsertOutcome> {
    if new.day <= 0 {
        return Err(DbError::invalid_data(format!(
            "day must be positive, got {}",
            new.day
        )));
    }
    let media = dedup_media(&new.media_refs);
    if media.is_empty() {
        return Err(DbError::invalid_data(format!(
            "day {} needs at least one media ref",
            new.day
        )));
    }

    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, EntryRow>(select_entries!("WHERE day = ?"))
        .bind(new.day)
        .fetch_optional(&mut *tx)
        .await?;

    let outcome = match existing {
        None => {
            if media.len() > MAX_MEDIA_SLOTS {
                return Err(DbError::NoAvailableSlots {
                    day: new.day,
                    requested: media.len(),
                    available: MAX_MEDIA_SLOTS,
                });
            }

            sqlx::query(
                r#"
                INSERT INTO daily_johans (day, message_id, channel_id, user_id, username,
                                          media_url1, media_url2, media_url3, timestamp, confirmed)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
                "#,
            )
            .bind(new.day)
            .bind(&new.origin_message_id)
            .bind(&new.origin_channel_id)
            .bind(&new.submitter_id)
            .bind(&new.submitter_display)
            .bind(slot(&media, 0))
            .bind(slot(&media, 1))
            .bind(slot(&media, 2))
            .bind(new.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::from_insert(e, new.day))?;

            UpsertOutcome::Inserted
        }
        Some(row) => {
            let entry = row.into_entry()?;
            let foreign = entry.origin_message_id != new.origin_message_id;
            match mode {
                WriteMode::InsertOnly => return Err(DbError::DayConflict { day: new.day }),
                WriteMode::SameOrigin if foreign => {
                    return Err(DbError::DayConflict { day: new.day });
                }
                _ => {}
            }
            let fresh: Vec<String> = media
                .into_iter()
                .filter(|m| !entry.media_refs.contains(m))
                .collect();
            let available = entry.free_slots();

            if !fresh.is_empty() && available == 0 {
                return Err(DbError::SlotsExceeded { day: new.day });
            }
            if fresh.len() > available {
                return Err(DbError::NoAvailableSlots {
                    day: new.day,
                    requested: fresh.len(),
                    available,
                });
            }

            let mut merged = entry.media_refs;
            merged.extend(fresh.iter().cloned());

            sqlx::query(
                r#"
                UPDATE daily_johans
                SET message_id = ?, channel_id = ?, user_id = ?, username = ?,
                    media_url1 = ?, media_url2 = ?, media_url3 = ?,
                    timestamp = ?, confirmed = 1
                WHERE day = ?
                "#,
            )
            .bind(&new.origin_message_id)
            .bind(&new.origin_channel_id)
            .bind(&new.submitter_id)
            .bind(&new.submitter_display)
            .bind(slot(&merged, 0))
            .bind(slot(&merged, 1))
            .bind(slot(&merged, 2))
            .bind(new.timestamp.to_rfc3339())
            .bind(new.day)
            .execute(&mut *tx)
            .await?;

            UpsertOutcome::Merged { added: fresh.len() }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Delete a single day.
pub async fn delete_entry(pool: &SqlitePool, day: i64) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM daily_johans WHERE day = ?")
        .bind(day)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every day backed by a message.
pub async fn delete_entries_by_message(pool: &SqlitePool, message_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM daily_johans WHERE message_id = ?")
        .bind(message_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Insert entries whose day is not archived yet; existing days are skipped.
///
/// All records are validated before anything is written. The first invalid
/// record fails the whole batch with `MalformedRecord`.
pub async fn import_entries(pool: &SqlitePool, entries: &[ArchiveEntry]) -> DbResult<ImportReport> {
    for (index, entry) in entries.iter().enumerate() {
        entry
            .validate()
            .map_err(|reason| DbError::malformed(index, reason))?;
    }

    let mut tx = pool.begin().await?;
    let mut report = ImportReport::default();

    for entry in entries {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_johans (day, message_id, channel_id, user_id, username,
                                      media_url1, media_url2, media_url3, timestamp, confirmed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(day) DO NOTHING
            "#,
        )
        .bind(entry.day)
        .bind(&entry.origin_message_id)
        .bind(&entry.origin_channel_id)
        .bind(&entry.submitter_id)
        .bind(&entry.submitter_display)
        .bind(slot(&entry.media_refs, 0))
        .bind(slot(&entry.media_refs, 1))
        .bind(slot(&entry.media_refs, 2))
        .bind(entry.timestamp.to_rfc3339())
        .bind(entry.confirmed)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            report.skipped += 1;
        } else {
            report.inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ArchiveDb;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn archive(day: i64, message_id: &str, media: &[&str]) -> NewArchive {
        NewArchive {
            day,
            media_refs: media.iter().map(|m| m.to_string()).collect(),
            origin_message_id: message_id.to_string(),
            origin_channel_id: Some("100".to_string()),
            submitter_id: Some("42".to_string()),
            submitter_display: Some("johan".to_string()),
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T16:00:00-05:00").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_lookup() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        let outcome = upsert_entry(pool, &archive(1, "m1", &["a", "b"]))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let entry = get_entry(pool, 1).await.unwrap().expect("day 1 exists");
        assert_eq!(entry.media_refs, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(entry.origin_message_id, "m1");
        assert_eq!(entry.submitter_display.as_deref(), Some("johan"));
        assert!(entry.confirmed);

        assert!(get_entry(pool, 2).await.unwrap().is_none());
        assert_eq!(get_max_day(pool).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_merge_fills_free_slots_and_overwrites_provenance() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        upsert_entry(pool, &archive(5, "m1", &["a"])).await.unwrap();
        let outcome = upsert_entry(pool, &archive(5, "m2", &["b", "c"]))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Merged { added: 2 });

        let entry = get_entry(pool, 5).await.unwrap().unwrap();
        assert_eq!(
            entry.media_refs,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(entry.origin_message_id, "m2");
    }

    #[tokio::test]
    async fn test_resubmitting_same_media_is_idempotent() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        upsert_entry(pool, &archive(7, "m1", &["a"])).await.unwrap();
        let outcome = upsert_entry(pool, &archive(7, "m1", &["a"])).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Merged { added: 0 });

        let entry = get_entry(pool, 7).await.unwrap().unwrap();
        assert_eq!(entry.media_refs, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_full_day_rejects_new_media() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        upsert_entry(pool, &archive(3, "m1", &["a", "b", "c"]))
            .await
            .unwrap();
        // Same refs again is fine
        upsert_entry(pool, &archive(3, "m1", &["c"])).await.unwrap();

        let err = upsert_entry(pool, &archive(3, "m2", &["d"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::SlotsExceeded { day: 3 }));

        let entry = get_entry(pool, 3).await.unwrap().unwrap();
        assert_eq!(entry.origin_message_id, "m1");
        assert_eq!(entry.media_refs.len(), 3);
    }

    #[tokio::test]
    async fn test_partial_fit_places_nothing() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        upsert_entry(pool, &archive(2, "m1", &["a", "b"])).await.unwrap();
        let err = upsert_entry(pool, &archive(2, "m2", &["c", "d"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::NoAvailableSlots {
                day: 2,
                requested: 2,
                available: 1
            }
        ));

        let entry = get_entry(pool, 2).await.unwrap().unwrap();
        assert_eq!(entry.media_refs, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(entry.origin_message_id, "m1");
    }

    #[tokio::test]
    async fn test_same_origin_mode_refuses_foreign_message() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        write_entry(pool, &archive(4, "m1", &["a"]), WriteMode::SameOrigin)
            .await
            .unwrap();
        let outcome = write_entry(pool, &archive(4, "m1", &["b"]), WriteMode::SameOrigin)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Merged { added: 1 });

        let err = write_entry(pool, &archive(4, "m2", &["c"]), WriteMode::SameOrigin)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DayConflict { day: 4 }));

        let entry = get_entry(pool, 4).await.unwrap().unwrap();
        assert_eq!(entry.origin_message_id, "m1");
        assert_eq!(entry.media_refs, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_insert_only_mode_leaves_existing_day_alone() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        let outcome = write_entry(pool, &archive(6, "m1", &["a"]), WriteMode::InsertOnly)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let err = write_entry(pool, &archive(6, "m1", &["b"]), WriteMode::InsertOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DayConflict { day: 6 }));
        assert_eq!(
            get_entry(pool, 6).await.unwrap().unwrap().media_refs,
            vec!["a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_media_is_rejected() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let err = upsert_entry(db.pool(), &archive(1, "m1", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidData { .. }));
        assert_eq!(count_entries(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_by_message_removes_every_backed_day() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        upsert_entry(pool, &archive(5, "series", &["a"])).await.unwrap();
        upsert_entry(pool, &archive(6, "series", &["b"])).await.unwrap();
        upsert_entry(pool, &archive(7, "other", &["c"])).await.unwrap();

        let backed = get_entries_by_message(pool, "series").await.unwrap();
        assert_eq!(backed.iter().map(|e| e.day).collect::<Vec<_>>(), vec![5, 6]);

        let removed = delete_entries_by_message(pool, "series").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(get_days_in_range(pool, 1, 10).await.unwrap(), vec![7]);

        assert!(delete_entry(pool, 7).await.unwrap());
        assert!(!delete_entry(pool, 7).await.unwrap());
    }

    #[tokio::test]
    async fn test_import_skips_existing_days() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        upsert_entry(pool, &archive(1, "live", &["x"])).await.unwrap();

        let exported = {
            let other = ArchiveDb::open_in_memory().await.unwrap();
            upsert_entry(other.pool(), &archive(1, "old", &["a"]))
                .await
                .unwrap();
            upsert_entry(other.pool(), &archive(2, "old", &["b", "c"]))
                .await
                .unwrap();
            list_entries(other.pool()).await.unwrap()
        };

        let report = import_entries(pool, &exported).await.unwrap();
        assert_eq!(
            report,
            ImportReport {
                inserted: 1,
                skipped: 1
            }
        );

        let day1 = get_entry(pool, 1).await.unwrap().unwrap();
        assert_eq!(day1.origin_message_id, "live");
        let day2 = get_entry(pool, 2).await.unwrap().unwrap();
        assert_eq!(day2.media_refs, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_import_is_all_or_nothing_on_validation() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        let good = ArchiveEntry {
            day: 1,
            media_refs: vec!["a".into()],
            origin_message_id: "m".into(),
            origin_channel_id: None,
            submitter_id: None,
            submitter_display: None,
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T16:00:00Z").unwrap(),
            confirmed: true,
        };
        let bad = ArchiveEntry {
            day: 2,
            media_refs: vec![],
            ..good.clone()
        };

        let err = import_entries(pool, &[good, bad]).await.unwrap_err();
        assert!(matches!(err, DbError::MalformedRecord { index: 1, .. }));
        assert_eq!(count_entries(pool).await.unwrap(), 0);
    }
}
