//! Keyword replies and the Walpurgisnacht announcement.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::BotContext;
use crate::transport::Conversation;

pub const WALPURGIS_ANNOUNCEMENT: &str = "TONIGHT IS WALPURGIS!!!";

const LEBRON: &str = "LeBron... my pookie bear, my glorious king. From Akron to Miami and back \
home again, down 3-1 and you still brought it home for Cleveland. I will weep the day you retire. \
Still the goat, my goat. I love you, LeBron James. ☺️♥️🫶🏻";

lazy_static! {
    static ref TRIGGERS: Vec<(Regex, &'static str)> = vec![
        (
            Regex::new(r"(?i)\bcringe\b").expect("valid regex"),
            "https://tenor.com/view/cringe-comp-cringe-shrek-shrek-cringe-compilation-snap-gif-11981937",
        ),
        (
            Regex::new(r"(?i)\bmassive\b").expect("valid regex"),
            "https://tenor.com/view/ninja-any-haircut-recommendations-low-taper-fade-you-know-what-else-is-massive-gif-3708438262570242561",
        ),
        (
            Regex::new(r"(?i)\be+r+m+\b").expect("valid regex"),
            "https://tenor.com/view/jungwon-jungwon-glasses-jungwon-um-ackshually-jungwon-um-actually-gif-16607372845996584568",
        ),
        (
            Regex::new(r"(?i)\brip\s*bozo\b").expect("valid regex"),
            "https://tenor.com/view/rip-bozo-gif-22294771",
        ),
        (Regex::new(r"(?i)\blebron\b").expect("valid regex"), LEBRON),
    ];
}

/// Canned replies for every trigger word in `text`, in trigger order.
pub fn fun_responses(text: &str) -> Vec<&'static str> {
    TRIGGERS
        .iter()
        .filter(|(pattern, _)| pattern.is_match(text))
        .map(|(_, reply)| *reply)
        .collect()
}

pub fn is_walpurgisnacht(date: NaiveDate) -> bool {
    date.month() == 4 && date.day() == 30
}

/// The first local midnight strictly after `now`.
pub fn next_local_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let tomorrow = now
        .with_timezone(&tz)
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    let naive = tomorrow.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Post the announcement in the default channel every April 30 until `shutdown`.
pub async fn run_walpurgis_announcer(
    ctx: BotContext,
    conv: Arc<dyn Conversation>,
    shutdown: CancellationToken,
) {
    let tz = ctx.config.tz();
    info!("Walpurgisnacht announcer started");
    loop {
        let now = Utc::now();
        if is_walpurgisnacht(now.with_timezone(&tz).date_naive()) {
            info!("Sending Walpurgisnacht announcement");
            conv.send(ctx.config.default_channel_id, WALPURGIS_ANNOUNCEMENT)
                .await;
        }

        let wait = (next_local_midnight(now, tz) - now)
            .to_std()
            .unwrap_or_default();
        debug!(?wait, "Announcer sleeping until next local midnight");
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.cancelled() => break,
        }
    }
}
