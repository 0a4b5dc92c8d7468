//! Next-expected-day and cooldown tracking.
//!
//! The tracker is a cache over the store: on startup, and after any delete or
//! import, it is rebuilt from the highest archived day.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use walpurgis_db::ArchiveDb;

use crate::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownState {
    /// One past the highest archived day; 1 on an empty archive
    pub expected_next_day: i64,
    pub last_archive_time: Option<DateTime<Utc>>,
}

impl Default for CooldownState {
    fn default() -> Self {
        Self {
            expected_next_day: 1,
            last_archive_time: None,
        }
    }
}

/// Whether an automatic archive may proceed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    Closed {
        elapsed: TimeDelta,
        remaining: TimeDelta,
    },
}

#[derive(Debug)]
pub struct CooldownTracker {
    state: RwLock<CooldownState>,
    window: TimeDelta,
}

impl CooldownTracker {
    pub fn new(window: TimeDelta) -> Self {
        Self {
            state: RwLock::new(CooldownState::default()),
            window,
        }
    }

    /// Build a tracker from what the store already holds.
    pub async fn load(db: &ArchiveDb, window: TimeDelta) -> CoreResult<Self> {
        let tracker = Self::new(window);
        tracker.rebuild(db).await?;
        Ok(tracker)
    }

    /// Re-derive state from the store.
    pub async fn rebuild(&self, db: &ArchiveDb) -> CoreResult<CooldownState> {
        let state = match db.latest().await? {
            Some(entry) => CooldownState {
                expected_next_day: entry.day.saturating_add(1),
                last_archive_time: Some(entry.timestamp.with_timezone(&Utc)),
            },
            None => CooldownState::default(),
        };
        *self.state.write() = state;
        info!(
            expected_next_day = state.expected_next_day,
            last_archive_time = ?state.last_archive_time,
            "Cooldown tracker rebuilt"
        );
        Ok(state)
    }

    pub fn current(&self) -> CooldownState {
        *self.state.read()
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// Record a successful commit of `day` at `at`.
    pub fn record_commit(&self, day: i64, at: DateTime<Utc>) {
        let mut state = self.state.write();
        state.expected_next_day = state.expected_next_day.max(day.saturating_add(1));
        state.last_archive_time = Some(at);
        debug!(day, expected_next_day = state.expected_next_day, "Recorded commit");
    }

    /// The cooldown gate at `now`. The very first archive is never gated.
    pub fn check(&self, now: DateTime<Utc>) -> Gate {
        let state = self.current();
        if state.expected_next_day == 1 {
            return Gate::Open;
        }
        let Some(last) = state.last_archive_time else {
            return Gate::Open;
        };

        let elapsed = now - last;
        if elapsed < self.window {
            Gate::Closed {
                elapsed,
                remaining: self.window - elapsed,
            }
        } else {
            Gate::Open
        }
    }

    /// Time left before the gate opens, zero when already open.
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        match self.check(now) {
            Gate::Open => TimeDelta::zero(),
            Gate::Closed { remaining, .. } => remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walpurgis_db::NewArchive;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_empty_archive_is_never_gated() {
        let tracker = CooldownTracker::new(TimeDelta::hours(12));
        assert_eq!(tracker.check(Utc::now()), Gate::Open);
        assert_eq!(tracker.current().expected_next_day, 1);
    }

    #[test]
    fn test_cooldown_boundary() {
        let tracker = CooldownTracker::new(TimeDelta::hours(12));
        let last = at("2024-05-01T10:00:00Z");
        tracker.record_commit(4, last);

        match tracker.check(last + TimeDelta::hours(11) + TimeDelta::minutes(59)) {
            Gate::Closed { remaining, .. } => assert_eq!(remaining, TimeDelta::minutes(1)),
            Gate::Open => panic!("expected cooldown to be active"),
        }
        assert_eq!(tracker.check(last + TimeDelta::hours(12)), Gate::Open);
    }

    #[test]
    fn test_record_commit_never_lowers_expected_day() {
        let tracker = CooldownTracker::new(TimeDelta::hours(12));
        tracker.record_commit(10, Utc::now());
        tracker.record_commit(3, Utc::now());
        assert_eq!(tracker.current().expected_next_day, 11);
    }

    #[test]
    fn test_record_commit_at_largest_day_saturates() {
        let tracker = CooldownTracker::new(TimeDelta::hours(12));
        tracker.record_commit(i64::MAX, Utc::now());
        assert_eq!(tracker.current().expected_next_day, i64::MAX);
    }

    #[tokio::test]
    async fn test_rebuild_follows_store() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let stamp = DateTime::parse_from_rfc3339("2024-05-02T16:00:00-05:00").unwrap();
        for day in [1, 2, 5] {
            db.upsert(&NewArchive {
                day,
                media_refs: vec![format!("m{}", day)],
                origin_message_id: day.to_string(),
                origin_channel_id: None,
                submitter_id: None,
                submitter_display: None,
                timestamp: stamp,
            })
            .await
            .unwrap();
        }

        let tracker = CooldownTracker::load(&db, TimeDelta::hours(12)).await.unwrap();
        assert_eq!(tracker.current().expected_next_day, 6);
        assert_eq!(
            tracker.current().last_archive_time,
            Some(stamp.with_timezone(&Utc))
        );

        db.delete_by_day(5).await.unwrap();
        let state = tracker.rebuild(&db).await.unwrap();
        assert_eq!(state.expected_next_day, 3);
    }
}
