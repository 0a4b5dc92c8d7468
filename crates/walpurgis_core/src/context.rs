//! Shared state handed to every conversation and command.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};

use walpurgis_db::ArchiveDb;

use crate::config::BotConfig;
use crate::cooldown::CooldownTracker;
use crate::dialogue::{Dialogue, Line};
use crate::error::CoreResult;

/// Cheap to clone; all fields are shared handles.
#[derive(Debug, Clone)]
pub struct BotContext {
    pub config: Arc<BotConfig>,
    pub db: ArchiveDb,
    pub tracker: Arc<CooldownTracker>,
    pub dialogue: Arc<Dialogue>,
}

impl BotContext {
    /// Wire up shared state, deriving the tracker from what the store holds.
    pub async fn new(config: BotConfig, db: ArchiveDb) -> CoreResult<Self> {
        let tracker = CooldownTracker::load(&db, config.cooldown()).await?;
        let dialogue = Dialogue::new(config.persona);
        Ok(Self {
            config: Arc::new(config),
            db,
            tracker: Arc::new(tracker),
            dialogue: Arc::new(dialogue),
        })
    }

    /// Word a line in the active persona.
    pub fn say(&self, line: &Line) -> String {
        self.dialogue.say(line)
    }

    /// `now` in the configured timezone, as stored on archive entries.
    pub fn local_timestamp(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.config.tz()).fixed_offset()
    }

    /// Re-derive the tracker after the store changed outside the commit path.
    pub async fn resync_tracker(&self) -> CoreResult<()> {
        self.tracker.rebuild(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_timestamp_uses_configured_zone() {
        let config = BotConfig {
            timezone: "America/Chicago".to_string(),
            ..Default::default()
        };
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let ctx = BotContext::new(config, db).await.unwrap();

        let now = DateTime::parse_from_rfc3339("2024-07-01T21:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let local = ctx.local_timestamp(now);
        assert_eq!(local.to_rfc3339(), "2024-07-01T16:00:00-05:00");
        assert_eq!(ctx.tracker.current().expected_next_day, 1);
    }
}
