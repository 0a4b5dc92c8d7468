//! Archive entry models.
//!
//! One entry per sequence day. The table keeps three fixed media columns;
//! the model exposes them as an ordered list of filled slots.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{DbError, DbResult};

/// Maximum number of media references an entry can hold.
pub const MAX_MEDIA_SLOTS: usize = 3;

/// An archived daily post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Sequence day, unique and positive
    pub day: i64,

    /// Filled media slots in slot order (1-3 items)
    pub media_refs: Vec<String>,

    /// Chat message that produced (or last updated) this entry
    pub origin_message_id: String,

    pub origin_channel_id: Option<String>,
    pub submitter_id: Option<String>,
    pub submitter_display: Option<String>,

    /// Archival time in the bot's reference timezone
    pub timestamp: DateTime<FixedOffset>,

    /// Always true for current flows
    #[serde(default = "default_confirmed")]
    pub confirmed: bool,
}

fn default_confirmed() -> bool {
    true
}

impl ArchiveEntry {
    /// Check the invariants a stored entry must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.day <= 0 {
            return Err(format!("day must be positive, got {}", self.day));
        }
        if self.origin_message_id.trim().is_empty() {
            return Err("origin_message_id is empty".to_string());
        }
        if self.media_refs.is_empty() {
            return Err("at least one media ref is required".to_string());
        }
        if self.media_refs.len() > MAX_MEDIA_SLOTS {
            return Err(format!(
                "at most {} media refs are allowed, got {}",
                MAX_MEDIA_SLOTS,
                self.media_refs.len()
            ));
        }
        if self.media_refs.iter().any(|m| m.trim().is_empty()) {
            return Err("media refs must not be empty".to_string());
        }
        Ok(())
    }

    /// Media refs laid out over the three fixed slots.
    pub fn slots(&self) -> [Option<String>; MAX_MEDIA_SLOTS] {
        let mut slots: [Option<String>; MAX_MEDIA_SLOTS] = Default::default();
        for (slot, media) in slots.iter_mut().zip(self.media_refs.iter()) {
            *slot = Some(media.clone());
        }
        slots
    }

    /// Number of unfilled media slots.
    pub fn free_slots(&self) -> usize {
        MAX_MEDIA_SLOTS.saturating_sub(self.media_refs.len())
    }
}

/// Input to an upsert: one archive call for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArchive {
    pub day: i64,
    pub media_refs: Vec<String>,
    pub origin_message_id: String,
    pub origin_channel_id: Option<String>,
    pub submitter_id: Option<String>,
    pub submitter_display: Option<String>,
    pub timestamp: DateTime<FixedOffset>,
}

/// How an upsert treats a day that is already archived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Merge into the day whatever message backs it
    #[default]
    Merge,
    /// Merge only when the day is backed by the same message; `DayConflict` otherwise
    SameOrigin,
    /// Never touch an existing day; `DayConflict` if it is there
    InsertOnly,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new entry was created for the day
    Inserted,
    /// The day existed; `added` new media refs went into free slots and provenance was refreshed
    Merged { added: usize },
}

/// Result of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    /// Records whose day already existed (left untouched)
    pub skipped: usize,
}

/// Raw table row.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct EntryRow {
    pub day: i64,
    pub message_id: String,
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub media_url1: Option<String>,
    pub media_url2: Option<String>,
    pub media_url3: Option<String>,
    pub timestamp: String,
    pub confirmed: bool,
}

impl EntryRow {
    /// Convert database row to an ArchiveEntry.
    pub fn into_entry(self) -> DbResult<ArchiveEntry> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp).map_err(|e| {
            DbError::invalid_data(format!(
                "day {} has unparseable timestamp '{}': {}",
                self.day, self.timestamp, e
            ))
        })?;

        let media_refs = [self.media_url1, self.media_url2, self.media_url3]
            .into_iter()
            .flatten()
            .collect();

        Ok(ArchiveEntry {
            day: self.day,
            media_refs,
            origin_message_id: self.message_id,
            origin_channel_id: self.channel_id,
            submitter_id: self.user_id,
            submitter_display: self.username,
            timestamp,
            confirmed: self.confirmed,
        })
    }
}

/// One record of an import file.
///
/// Accepts the export layout (`media_refs`, `origin_*`) as well as the older
/// flat column layout (`message_id`, `channel_id`, `media_url1..3`).
#[derive(Debug, Clone, Default, Deserialize)]
struct ImportRecord {
    day: Option<i64>,
    #[serde(default)]
    media_refs: Vec<String>,
    media_url1: Option<String>,
    media_url2: Option<String>,
    media_url3: Option<String>,
    #[serde(alias = "message_id")]
    origin_message_id: Option<String>,
    #[serde(alias = "channel_id")]
    origin_channel_id: Option<String>,
    #[serde(alias = "user_id")]
    submitter_id: Option<String>,
    #[serde(alias = "username")]
    submitter_display: Option<String>,
    timestamp: Option<String>,
    confirmed: Option<bool>,
}

impl ImportRecord {
    fn into_entry(self, index: usize) -> DbResult<ArchiveEntry> {
        let day = self
            .day
            .ok_or_else(|| DbError::malformed(index, "missing 'day'"))?;
        let origin_message_id = self
            .origin_message_id
            .ok_or_else(|| DbError::malformed(index, "missing 'origin_message_id'"))?;
        let raw_timestamp = self
            .timestamp
            .ok_or_else(|| DbError::malformed(index, "missing 'timestamp'"))?;
        let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp).map_err(|e| {
            DbError::malformed(index, format!("bad timestamp '{}': {}", raw_timestamp, e))
        })?;

        let mut media_refs = self.media_refs;
        media_refs.extend(
            [self.media_url1, self.media_url2, self.media_url3]
                .into_iter()
                .flatten(),
        );

        let entry = ArchiveEntry {
            day,
            media_refs,
            origin_message_id,
            origin_channel_id: self.origin_channel_id,
            submitter_id: self.submitter_id,
            submitter_display: self.submitter_display,
            timestamp,
            confirmed: self.confirmed.unwrap_or(true),
        };
        entry
            .validate()
            .map_err(|reason| DbError::malformed(index, reason))?;
        Ok(entry)
    }
}

/// Parse an import file (a JSON list of records).
///
/// Fails on the first invalid record; nothing is returned for a partially
/// valid batch.
pub fn parse_import(json: &str) -> DbResult<Vec<ArchiveEntry>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let record: ImportRecord = serde_json::from_value(value)
                .map_err(|e| DbError::malformed(index, e.to_string()))?;
            record.into_entry(index)
        })
        .collect()
}

/// Serialize entries in the export layout.
pub fn render_export(entries: &[ArchiveEntry]) -> DbResult<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_accepts_legacy_columns() {
        let json = r#"[
            {
                "day": 4,
                "message_id": "111",
                "channel_id": "222",
                "media_url1": "https://cdn/a.png",
                "media_url2": null,
                "media_url3": "https://cdn/c.png",
                "timestamp": "2024-05-01T16:00:00-05:00"
            }
        ]"#;

        let entries = parse_import(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].day, 4);
        assert_eq!(entries[0].origin_message_id, "111");
        assert_eq!(entries[0].origin_channel_id.as_deref(), Some("222"));
        assert_eq!(
            entries[0].media_refs,
            vec!["https://cdn/a.png".to_string(), "https://cdn/c.png".to_string()]
        );
        assert!(entries[0].confirmed);
    }

    #[test]
    fn test_parse_import_reports_first_bad_record() {
        let json = r#"[
            {"day": 1, "origin_message_id": "1", "media_refs": ["a"], "timestamp": "2024-05-01T16:00:00Z"},
            {"day": 2, "origin_message_id": "2", "media_refs": [], "timestamp": "2024-05-02T16:00:00Z"},
            {"day": 0, "origin_message_id": "3", "media_refs": ["c"], "timestamp": "2024-05-03T16:00:00Z"}
        ]"#;

        match parse_import(json) {
            Err(DbError::MalformedRecord { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_slots_layout() {
        let entry = ArchiveEntry {
            day: 3,
            media_refs: vec!["a".into(), "b".into()],
            origin_message_id: "9".into(),
            origin_channel_id: None,
            submitter_id: None,
            submitter_display: None,
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T16:00:00Z").unwrap(),
            confirmed: true,
        };
        assert_eq!(entry.slots(), [Some("a".into()), Some("b".into()), None]);
        assert_eq!(entry.free_slots(), 1);
    }
}
