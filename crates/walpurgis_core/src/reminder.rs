//! Daily nudge when the next day has not been archived.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::BotContext;
use crate::dialogue::Line;
use crate::error::CoreResult;
use crate::transport::Conversation;

/// How long to wait before looking again when nothing has been archived yet.
const IDLE_RECHECK: Duration = Duration::from_secs(60 * 60);

/// When to remind after an archive at `last_archive`: `hour` o'clock local time
/// on the following day, or the first such time after `now`.
pub fn next_reminder(
    last_archive: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: Tz,
    hour: u32,
) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let mut date = last_archive.with_timezone(&tz).date_naive();
    loop {
        date = match date.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => return now,
        };
        let naive = date.and_time(at);
        // Skipped local times (DST gaps) fall back to reading the time as UTC
        let candidate = tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive));
        if candidate > now {
            return candidate;
        }
    }
}

/// The reminder to send right now, if the archive has started.
pub async fn reminder_line(ctx: &BotContext) -> CoreResult<Option<Line>> {
    let stats = ctx.db.stats().await?;
    let Some(max_day) = stats.max_day else {
        return Ok(None);
    };

    let user = ctx.config.submitter_id;
    let day = max_day.saturating_add(1);
    let missing = stats.missing_days();
    Ok(Some(if missing > 0 {
        Line::GapAlert { user, day, missing }
    } else {
        Line::DailyReminder { user, day }
    }))
}

/// Send reminders to the default channel until `shutdown`.
///
/// A reminder is dropped if a new archive lands while waiting for it.
pub async fn run_reminders(
    ctx: BotContext,
    conv: Arc<dyn Conversation>,
    shutdown: CancellationToken,
) {
    let tz = ctx.config.tz();
    info!(hour = ctx.config.reminder_hour, "Daily reminder task started");

    loop {
        let anchor = ctx.tracker.current().last_archive_time;
        let wait = match anchor {
            Some(last) => {
                let now = Utc::now();
                let due = next_reminder(last, now, tz, ctx.config.reminder_hour);
                debug!(%due, "Next reminder scheduled");
                (due - now).to_std().unwrap_or_default()
            }
            None => IDLE_RECHECK,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.cancelled() => break,
        }

        if anchor.is_none() || ctx.tracker.current().last_archive_time != anchor {
            continue;
        }

        match reminder_line(&ctx).await {
            Ok(Some(line)) => {
                info!("Sending daily reminder");
                conv.send(ctx.config.default_channel_id, &ctx.say(&line))
                    .await;
            }
            Ok(None) => {}
            Err(e) => warn!("Could not build reminder: {}", e),
        }
    }
}
