//! Operator commands.
//!
//! Each command answers through the [`Interaction`] it was invoked from.
//! Refusals are worded in the active persona and also returned as errors so
//! callers can log them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use walpurgis_db::{
    parse_import, render_export, ArchiveEntry, DbError, ImportReport, NewArchive, WriteMode,
    MAX_MEDIA_SLOTS,
};

use crate::context::BotContext;
use crate::dialogue::{day_list, Line, Persona};
use crate::error::{format_delta, ArchiveError, CoreResult};
use crate::inference::{is_yes, parse_day_list, parse_message_link};
use crate::transport::{
    jump_link, Conversation, InboundMessage, Interaction, MessageSource, ReplyMatcher,
    TransportError,
};

/// A refused command: what to tell the user and what to return.
struct Refusal {
    line: Line,
    error: ArchiveError,
}

impl Refusal {
    fn new(line: Line, error: ArchiveError) -> Self {
        Self { line, error }
    }
}

impl From<ArchiveError> for Refusal {
    fn from(error: ArchiveError) -> Self {
        Self {
            line: Line::from_error(&error),
            error,
        }
    }
}

impl From<DbError> for Refusal {
    fn from(error: DbError) -> Self {
        ArchiveError::from(error).into()
    }
}

type Step<T> = Result<T, Refusal>;

async fn answer<T>(ctx: &BotContext, interaction: &dyn Interaction, result: Step<T>) -> CoreResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(refusal) => {
            info!(user = interaction.user_id(), "Command refused: {}", refusal.error);
            interaction.send_ephemeral(&ctx.say(&refusal.line)).await;
            Err(refusal.error)
        }
    }
}

fn require_admin(ctx: &BotContext, interaction: &dyn Interaction, action: &str) -> Step<()> {
    if ctx.config.is_admin(interaction.user_id()) {
        return Ok(());
    }
    let error = ArchiveError::NotAuthorized {
        action: action.to_string(),
    };
    Err(Refusal::new(
        Line::Error {
            error: error.to_string(),
        },
        error,
    ))
}

// ----------------------------------------------------------------------------
// manual_archive
// ----------------------------------------------------------------------------

/// Archive an existing message for explicit days, bypassing cooldown and verification.
///
/// `message_ref` is a message id in the invoking channel or a message link.
/// With as many days as attachments, each attachment goes to its day. With a
/// single day, all attachments go to that day if they fit.
pub async fn manual_archive(
    ctx: &BotContext,
    source: &dyn MessageSource,
    interaction: &dyn Interaction,
    message_ref: &str,
    days: &str,
    now: DateTime<Utc>,
) -> CoreResult<Vec<i64>> {
    let result = manual_archive_inner(ctx, source, interaction, message_ref, days, now).await;
    answer(ctx, interaction, result).await
}

async fn manual_archive_inner(
    ctx: &BotContext,
    source: &dyn MessageSource,
    interaction: &dyn Interaction,
    message_ref: &str,
    days: &str,
    now: DateTime<Utc>,
) -> Step<Vec<i64>> {
    require_admin(ctx, interaction, "archive manually")?;

    let days = parse_day_list(days);
    if days.is_empty() || days.iter().any(|d| *d < 1) {
        return Err(Refusal::new(
            Line::NoValidDayNumbers,
            ArchiveError::invalid_input("no valid day numbers"),
        ));
    }

    let (channel_id, message_id) = resolve_message_ref(message_ref, interaction.channel_id())
        .ok_or_else(|| {
            Refusal::new(
                Line::InvalidMessageLink,
                ArchiveError::invalid_input(format!("bad message reference '{}'", message_ref)),
            )
        })?;

    let msg = source
        .fetch_message(channel_id, message_id)
        .await
        .map_err(|e| match e {
            TransportError::NotFound { .. } => Refusal::new(
                Line::MessageNotFound { msg_id: message_id },
                ArchiveError::Transport(e),
            ),
            other => ArchiveError::Transport(other).into(),
        })?;

    if msg.attachments.is_empty() {
        return Err(Refusal::new(
            Line::NoMediaFound,
            ArchiveError::invalid_input("message has no attachments"),
        ));
    }

    let origin = msg.id.to_string();
    if days.len() == msg.attachments.len() {
        for day in &days {
            if let Some(existing) = ctx.db.find_by_day(*day).await? {
                if existing.origin_message_id != origin {
                    return Err(Refusal::new(
                        Line::DayTakenResolveDupes { day: *day },
                        ArchiveError::DayConflict { day: *day },
                    ));
                }
            }
        }
        for (day, media) in days.iter().zip(msg.attachments.iter()) {
            store(ctx, &msg, *day, vec![media.clone()], WriteMode::SameOrigin, now).await?;
        }
    } else if days.len() == 1 && msg.attachments.len() <= MAX_MEDIA_SLOTS {
        store(ctx, &msg, days[0], msg.attachments.clone(), WriteMode::Merge, now).await?;
    } else {
        return Err(Refusal::new(
            Line::MismatchDaysAttachments,
            ArchiveError::Ambiguity {
                numbers: days.len(),
                media: msg.attachments.len(),
            },
        ));
    }

    info!(message_id = msg.id, days = ?days, "Manually archived message");
    interaction
        .send_public(&ctx.say(&Line::SuccessfulMediaArchive {
            message_id: msg.id,
            day_list: day_list(&days),
        }))
        .await;
    Ok(days)
}

async fn store(
    ctx: &BotContext,
    msg: &InboundMessage,
    day: i64,
    media_refs: Vec<String>,
    mode: WriteMode,
    now: DateTime<Utc>,
) -> Step<()> {
    ctx.db
        .upsert_with(
            &NewArchive {
                day,
                media_refs,
                origin_message_id: msg.id.to_string(),
                origin_channel_id: Some(msg.channel_id.to_string()),
                submitter_id: Some(msg.author_id.to_string()),
                submitter_display: Some(msg.author_name.clone()),
                timestamp: ctx.local_timestamp(now),
            },
            mode,
        )
        .await?;
    ctx.tracker.record_commit(day, now);
    Ok(())
}

/// A bare id refers to the fallback channel; a link names its own.
fn resolve_message_ref(message_ref: &str, fallback_channel: u64) -> Option<(u64, u64)> {
    let trimmed = message_ref.trim();
    if let Ok(id) = trimmed.parse::<u64>() {
        return Some((fallback_channel, id));
    }
    parse_message_link(trimmed)
}

// ----------------------------------------------------------------------------
// delete
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteTarget {
    Day(i64),
    Message(u64),
}

/// Delete a day, or every day a message backs, after a yes/no confirmation.
///
/// Returns the deleted days; empty when the user cancelled.
pub async fn delete(
    ctx: &BotContext,
    conv: &dyn Conversation,
    interaction: &dyn Interaction,
    day: Option<i64>,
    link: Option<&str>,
) -> CoreResult<Vec<i64>> {
    let result = delete_inner(ctx, conv, interaction, day, link).await;
    answer(ctx, interaction, result).await
}

async fn delete_inner(
    ctx: &BotContext,
    conv: &dyn Conversation,
    interaction: &dyn Interaction,
    day: Option<i64>,
    link: Option<&str>,
) -> Step<Vec<i64>> {
    require_admin(ctx, interaction, "delete archive entries")?;

    let target = match (day, link) {
        (Some(day), _) => DeleteTarget::Day(day),
        (None, Some(link)) => {
            let (_, message_id) = parse_message_link(link).ok_or_else(|| {
                Refusal::new(
                    Line::InvalidMessageLink,
                    ArchiveError::invalid_input(format!("bad message link '{}'", link)),
                )
            })?;
            DeleteTarget::Message(message_id)
        }
        (None, None) => {
            return Err(Refusal::new(
                Line::ProvideDayOrLink,
                ArchiveError::invalid_input("a day or a message link is required"),
            ))
        }
    };

    let entries: Vec<ArchiveEntry> = match target {
        DeleteTarget::Day(day) => ctx.db.find_by_day(day).await?.into_iter().collect(),
        DeleteTarget::Message(id) => ctx.db.find_by_message(&id.to_string()).await?,
    };
    if entries.is_empty() {
        return Err(Refusal::new(
            Line::NoEntryFound,
            ArchiveError::invalid_input("no matching archive entry"),
        ));
    }
    let days: Vec<i64> = entries.iter().map(|e| e.day).collect();

    interaction
        .send_ephemeral(&ctx.say(&Line::ConfirmDeletion {
            days: day_list(&days),
        }))
        .await;

    let timeout = ctx.config.confirm_timeout();
    let matcher = ReplyMatcher::any(interaction.user_id(), interaction.channel_id());
    let Some(reply) = conv.await_reply(matcher, timeout).await else {
        return Err(ArchiveError::TransportTimeout {
            waited_secs: timeout.as_secs(),
        }
        .into());
    };
    if !is_yes(&reply.content) {
        interaction
            .send_ephemeral(&ctx.say(&Line::DeletionCancelled))
            .await;
        return Ok(Vec::new());
    }

    match target {
        DeleteTarget::Day(day) => {
            ctx.db.delete_by_day(day).await?;
        }
        DeleteTarget::Message(id) => {
            ctx.db.delete_by_message(&id.to_string()).await?;
        }
    }
    ctx.resync_tracker().await?;

    info!(days = ?days, user = interaction.user_id(), "Deleted archive entries");
    interaction
        .send_ephemeral(&ctx.say(&Line::DeletionSuccess {
            days: day_list(&days),
        }))
        .await;
    Ok(days)
}

// ----------------------------------------------------------------------------
// search
// ----------------------------------------------------------------------------

/// Show the archived entry for a day with a jump link to its origin.
pub async fn search(
    ctx: &BotContext,
    interaction: &dyn Interaction,
    day: i64,
) -> CoreResult<Option<ArchiveEntry>> {
    let entry = ctx.db.find_by_day(day).await?;
    match &entry {
        Some(entry) => {
            interaction
                .send_public(&format_entry(entry, interaction.guild_id()))
                .await
        }
        None => {
            interaction
                .send_ephemeral(&ctx.say(&Line::NoDailyJohanFound { day }))
                .await
        }
    }
    Ok(entry)
}

/// Render an entry for chat.
pub fn format_entry(entry: &ArchiveEntry, guild_id: Option<u64>) -> String {
    let mut text = format!("**Day {}**\n", entry.day);
    for (i, media) in entry.media_refs.iter().enumerate() {
        text.push_str(&format!("Media {}: {}\n", i + 1, media));
    }
    text.push_str(&format!(
        "Archived: {}",
        entry.timestamp.format("%Y-%m-%d %H:%M %Z")
    ));

    let channel = entry
        .origin_channel_id
        .as_deref()
        .and_then(|c| c.parse::<u64>().ok());
    let message = entry.origin_message_id.parse::<u64>().ok();
    if let (Some(channel), Some(message)) = (channel, message) {
        text.push_str(&format!(
            "\n[Jump to message]({})",
            jump_link(guild_id, channel, message)
        ));
    }
    text
}

// ----------------------------------------------------------------------------
// status
// ----------------------------------------------------------------------------

/// Which days in a range are archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub start: i64,
    pub end: i64,
    pub archived: BTreeSet<i64>,
    pub page_size: usize,
}

impl StatusReport {
    pub fn total_days(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    pub fn missing(&self) -> usize {
        self.total_days() - self.archived.len()
    }

    pub fn total_pages(&self) -> usize {
        self.total_days().div_ceil(self.page_size.max(1)).max(1)
    }

    /// Render a 1-based page; out-of-range pages clamp to the nearest one.
    pub fn page(&self, page: usize) -> String {
        let page = page.clamp(1, self.total_pages());
        let size = self.page_size.max(1) as i64;
        let first = self.start + (page as i64 - 1) * size;
        let last = (first + size - 1).min(self.end);

        let mut text = format!(
            "**Daily Johan status, days {}-{}** ({} archived, {} missing) page {}/{}\n",
            self.start,
            self.end,
            self.archived.len(),
            self.missing(),
            page,
            self.total_pages()
        );
        for day in first..=last {
            let mark = if self.archived.contains(&day) { "✅" } else { "❌" };
            text.push_str(&format!("Day {}: {}\n", day, mark));
        }
        text
    }
}

/// Build a status report for `[start, end]`.
///
/// `end` defaults to the highest archived day, or to `start` on an empty archive.
pub async fn status_report(
    ctx: &BotContext,
    start: i64,
    end: Option<i64>,
) -> CoreResult<StatusReport> {
    if start < 1 {
        return Err(ArchiveError::invalid_input("start day must be at least 1"));
    }
    let end = match end {
        Some(end) => end,
        None => ctx.db.max_day().await?.unwrap_or(start).max(start),
    };
    if end < start {
        return Err(ArchiveError::invalid_input(format!(
            "end day {} is before start day {}",
            end, start
        )));
    }

    let archived = ctx.db.days_in_range(start, end).await?.into_iter().collect();
    Ok(StatusReport {
        start,
        end,
        archived,
        page_size: ctx.config.status_page_size,
    })
}

pub async fn status(
    ctx: &BotContext,
    interaction: &dyn Interaction,
    start: i64,
    end: Option<i64>,
    page: usize,
) -> CoreResult<StatusReport> {
    let result = status_report(ctx, start, end).await.map_err(Refusal::from);
    let report = answer(ctx, interaction, result).await?;
    interaction.send_ephemeral(&report.page(page)).await;
    Ok(report)
}

// ----------------------------------------------------------------------------
// persona
// ----------------------------------------------------------------------------

/// Switch the active persona. Unknown names leave it unchanged.
pub async fn set_persona(
    ctx: &BotContext,
    interaction: &dyn Interaction,
    name: &str,
) -> CoreResult<Persona> {
    let result = ctx.dialogue.set_persona(name).map_err(|unknown| {
        Refusal::new(
            Line::UnknownPersona {
                name: unknown.0.clone(),
            },
            ArchiveError::invalid_input(format!("unknown persona '{}'", unknown.0)),
        )
    });
    let persona = answer(ctx, interaction, result).await?;
    interaction
        .send_ephemeral(&ctx.say(&Line::PersonaSwitched { persona }))
        .await;
    Ok(persona)
}

// ----------------------------------------------------------------------------
// debug_info
// ----------------------------------------------------------------------------

/// Tracker state for operators.
pub async fn debug_info(
    ctx: &BotContext,
    interaction: &dyn Interaction,
    now: DateTime<Utc>,
) -> CoreResult<String> {
    let text = debug_text(ctx, now);
    interaction.send_ephemeral(&text).await;
    Ok(text)
}

pub fn debug_text(ctx: &BotContext, now: DateTime<Utc>) -> String {
    let state = ctx.tracker.current();
    let last = match state.last_archive_time {
        Some(at) => format!(
            "{} ({} ago)",
            at.with_timezone(&ctx.config.tz()).format("%Y-%m-%d %H:%M %Z"),
            format_delta(now - at)
        ),
        None => "never".to_string(),
    };
    let remaining = ctx.tracker.remaining(now);
    let cooldown = if remaining.is_zero() {
        "inactive".to_string()
    } else {
        format!("{} remaining", format_delta(remaining))
    };

    format!(
        "Next expected day: {}\nLast archive: {}\nCooldown: {}\nPersona: {}",
        state.expected_next_day,
        last,
        cooldown,
        ctx.dialogue.persona()
    )
}

// ----------------------------------------------------------------------------
// export / import
// ----------------------------------------------------------------------------

/// The whole archive as JSON records.
pub async fn export_json(ctx: &BotContext) -> CoreResult<String> {
    let entries = ctx.db.export_all().await?;
    info!(count = entries.len(), "Exporting archive");
    Ok(render_export(&entries)?)
}

/// Import JSON records. Nothing is written unless every record is valid;
/// days that already exist are skipped.
pub async fn import_json(ctx: &BotContext, json: &str) -> CoreResult<ImportReport> {
    let entries = parse_import(json)?;
    let report = ctx.db.bulk_import(&entries).await?;
    ctx.resync_tracker().await?;
    if report.skipped > 0 {
        warn!(skipped = report.skipped, "Import skipped days that already exist");
    }
    Ok(report)
}

pub async fn import(
    ctx: &BotContext,
    interaction: &dyn Interaction,
    json: &str,
) -> CoreResult<ImportReport> {
    let result = async {
        require_admin(ctx, interaction, "import archives")?;
        import_json(ctx, json).await.map_err(Refusal::from)
    }
    .await;
    let report = answer(ctx, interaction, result).await?;
    interaction
        .send_ephemeral(&format!(
            "Imported {} entries, skipped {} existing days.",
            report.inserted, report.skipped
        ))
        .await;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::render;
    use crate::test_helpers::fixtures::{at, post, test_context, CHANNEL, GUILD, JOHAN};
    use crate::test_helpers::transport::{FakeHistory, RecordingInteraction, ScriptedConversation};
    use pretty_assertions::assert_eq;

    fn admin() -> RecordingInteraction {
        RecordingInteraction::new(JOHAN, CHANNEL)
    }

    fn say(ctx: &BotContext, line: Line) -> String {
        render(ctx.dialogue.persona(), &line)
    }

    async fn archive(ctx: &BotContext, msg: &InboundMessage, days: &str) -> CoreResult<Vec<i64>> {
        let history = FakeHistory::new().with_message(msg.clone());
        manual_archive(ctx, &history, &admin(), &msg.id.to_string(), days, Utc::now()).await
    }

    #[tokio::test]
    async fn test_manual_archive_pairs_days_with_attachments() {
        let ctx = test_context().await;
        let days = archive(&ctx, &post(50, "", 2), "4, 5").await.unwrap();
        assert_eq!(days, vec![4, 5]);

        let day5 = ctx.db.find_by_day(5).await.unwrap().unwrap();
        assert_eq!(day5.media_refs, vec!["https://cdn.test/50/2.png"]);
        assert_eq!(ctx.tracker.current().expected_next_day, 6);
    }

    #[tokio::test]
    async fn test_manual_archive_single_day_takes_all_media() {
        let ctx = test_context().await;
        archive(&ctx, &post(50, "", 3), "8").await.unwrap();
        let day8 = ctx.db.find_by_day(8).await.unwrap().unwrap();
        assert_eq!(day8.media_refs.len(), 3);
    }

    #[tokio::test]
    async fn test_manual_archive_reports_missing_slots() {
        let ctx = test_context().await;
        archive(&ctx, &post(50, "", 2), "8").await.unwrap();

        let err = archive(&ctx, &post(51, "", 2), "8").await.unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::NoAvailableSlots {
                day: 8,
                requested: 2,
                available: 1
            }
        ));
        let day8 = ctx.db.find_by_day(8).await.unwrap().unwrap();
        assert_eq!(day8.media_refs.len(), 2);
    }

    #[tokio::test]
    async fn test_manual_archive_conflict_writes_nothing() {
        let ctx = test_context().await;
        archive(&ctx, &post(50, "", 1), "2").await.unwrap();

        let err = archive(&ctx, &post(51, "", 2), "1 2").await.unwrap_err();
        assert!(matches!(err, ArchiveError::DayConflict { day: 2 }));
        assert!(ctx.db.find_by_day(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_manual_archive_mismatch() {
        let ctx = test_context().await;
        let interaction = admin();
        let msg = post(50, "", 2);
        let history = FakeHistory::new().with_message(msg.clone());
        let err = manual_archive(&ctx, &history, &interaction, "50", "1 2 3", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Ambiguity { numbers: 3, media: 2 }));
        assert_eq!(
            interaction.last(),
            Some(say(&ctx, Line::MismatchDaysAttachments))
        );
    }

    #[tokio::test]
    async fn test_manual_archive_unknown_message() {
        let ctx = test_context().await;
        let interaction = admin();
        let link = format!("https://discord.com/channels/{}/{}/777", GUILD, CHANNEL);
        let err = manual_archive(&ctx, &FakeHistory::new(), &interaction, &link, "1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Transport(TransportError::NotFound { .. })));
        assert_eq!(
            interaction.last(),
            Some(say(&ctx, Line::MessageNotFound { msg_id: 777 }))
        );
    }

    #[tokio::test]
    async fn test_manual_archive_requires_admin() {
        let ctx = test_context().await;
        let msg = post(50, "", 1);
        let history = FakeHistory::new().with_message(msg);
        let stranger = RecordingInteraction::new(JOHAN + 5, CHANNEL);
        let err = manual_archive(&ctx, &history, &stranger, "50", "1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn test_delete_by_link_removes_series_and_rebuilds() {
        let ctx = test_context().await;
        archive(&ctx, &post(50, "", 1), "1").await.unwrap();
        archive(&ctx, &post(60, "", 2), "2 3").await.unwrap();
        assert_eq!(ctx.tracker.current().expected_next_day, 4);

        let conv = ScriptedConversation::new([Some("yes")]);
        let interaction = admin();
        let link = format!("https://discord.com/channels/{}/{}/60", GUILD, CHANNEL);
        let deleted = delete(&ctx, &conv, &interaction, None, Some(&link))
            .await
            .unwrap();

        assert_eq!(deleted, vec![2, 3]);
        assert_eq!(ctx.tracker.current().expected_next_day, 2);
        assert_eq!(
            interaction.responses(),
            vec![
                say(&ctx, Line::ConfirmDeletion { days: "2, 3".into() }),
                say(&ctx, Line::DeletionSuccess { days: "2, 3".into() }),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_cancelled_keeps_entry() {
        let ctx = test_context().await;
        archive(&ctx, &post(50, "", 1), "1").await.unwrap();

        let conv = ScriptedConversation::new([Some("nah")]);
        let deleted = delete(&ctx, &conv, &admin(), Some(1), None).await.unwrap();
        assert!(deleted.is_empty());
        assert!(ctx.db.find_by_day(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_timeout_keeps_entry() {
        let ctx = test_context().await;
        archive(&ctx, &post(50, "", 1), "1").await.unwrap();

        let conv = ScriptedConversation::silent();
        let err = delete(&ctx, &conv, &admin(), Some(1), None).await.unwrap_err();
        assert!(matches!(err, ArchiveError::TransportTimeout { waited_secs: 30 }));
        assert!(ctx.db.find_by_day(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_argument_errors() {
        let ctx = test_context().await;
        let conv = ScriptedConversation::silent();

        let interaction = admin();
        assert!(delete(&ctx, &conv, &interaction, None, None).await.is_err());
        assert_eq!(interaction.last(), Some(say(&ctx, Line::ProvideDayOrLink)));

        let interaction = admin();
        assert!(delete(&ctx, &conv, &interaction, None, Some("not a link"))
            .await
            .is_err());
        assert_eq!(interaction.last(), Some(say(&ctx, Line::InvalidMessageLink)));

        let interaction = admin();
        assert!(delete(&ctx, &conv, &interaction, Some(42), None).await.is_err());
        assert_eq!(interaction.last(), Some(say(&ctx, Line::NoEntryFound)));
    }

    #[tokio::test]
    async fn test_search_links_back_to_origin() {
        let ctx = test_context().await;
        archive(&ctx, &post(50, "", 1), "7").await.unwrap();

        let interaction = admin();
        let entry = search(&ctx, &interaction, 7).await.unwrap().unwrap();
        assert_eq!(entry.day, 7);
        let text = interaction.last().unwrap();
        assert!(text.contains("https://cdn.test/50/1.png"));
        assert!(text.contains(&format!(
            "https://discord.com/channels/{}/{}/50",
            GUILD, CHANNEL
        )));

        let interaction = admin();
        assert!(search(&ctx, &interaction, 8).await.unwrap().is_none());
        assert_eq!(
            interaction.last(),
            Some(say(&ctx, Line::NoDailyJohanFound { day: 8 }))
        );
    }

    #[tokio::test]
    async fn test_status_report_ranges() {
        let ctx = test_context().await;
        let empty = status_report(&ctx, 1, None).await.unwrap();
        assert_eq!((empty.start, empty.end), (1, 1));
        assert_eq!(empty.missing(), 1);

        archive(&ctx, &post(50, "", 3), "1 2 5").await.unwrap();
        let report = status_report(&ctx, 1, None).await.unwrap();
        assert_eq!(report.end, 5);
        assert_eq!(report.archived, BTreeSet::from([1, 2, 5]));
        assert_eq!(report.missing(), 2);
        let page = report.page(1);
        assert!(page.contains("Day 3: ❌"));
        assert!(page.contains("Day 5: ✅"));

        assert!(matches!(
            status_report(&ctx, 5, Some(2)).await,
            Err(ArchiveError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_pagination() {
        let report = StatusReport {
            start: 1,
            end: 45,
            archived: BTreeSet::new(),
            page_size: 20,
        };
        assert_eq!(report.total_pages(), 3);
        let last = report.page(3);
        assert!(last.contains("Day 41: ❌"));
        assert!(last.contains("Day 45: ❌"));
        assert!(!last.contains("Day 40:"));
        assert_eq!(report.page(99), last);
    }

    #[tokio::test]
    async fn test_set_persona() {
        let ctx = test_context().await;
        let interaction = admin();
        assert_eq!(
            set_persona(&ctx, &interaction, "Gentleman").await.unwrap(),
            Persona::Gentleman
        );
        assert!(set_persona(&ctx, &interaction, "pirate").await.is_err());
        assert_eq!(ctx.dialogue.persona(), Persona::Gentleman);
    }

    #[tokio::test]
    async fn test_debug_info_reports_cooldown() {
        let ctx = test_context().await;
        let first = at("2024-05-01T12:00:00Z");
        ctx.tracker.record_commit(3, first);

        let text = debug_text(&ctx, first + chrono::TimeDelta::hours(2));
        assert!(text.contains("Next expected day: 4"));
        assert!(text.contains("10h 00m remaining"));
    }

    #[tokio::test]
    async fn test_import_then_export() {
        let ctx = test_context().await;
        let json = r#"[
            {"day": 1, "message_id": "10", "media_url1": "a", "timestamp": "2024-05-01T16:00:00Z"},
            {"day": 2, "message_id": "11", "media_url1": "b", "timestamp": "2024-05-02T16:00:00Z"}
        ]"#;
        let report = import(&ctx, &admin(), json).await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(ctx.tracker.current().expected_next_day, 3);

        let again = import_json(&ctx, json).await.unwrap();
        assert_eq!((again.inserted, again.skipped), (0, 2));

        let exported = export_json(&ctx).await.unwrap();
        let parsed = parse_import(&exported).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].media_refs, vec!["b"]);
    }

    #[tokio::test]
    async fn test_import_malformed_writes_nothing() {
        let ctx = test_context().await;
        let json = r#"[
            {"day": 1, "message_id": "10", "media_url1": "a", "timestamp": "2024-05-01T16:00:00Z"},
            {"day": 2, "message_id": "11", "timestamp": "2024-05-02T16:00:00Z"}
        ]"#;
        let err = import_json(&ctx, json).await.unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedRecord { index: 1, .. }));
        assert_eq!(ctx.db.stats().await.unwrap().entry_count, 0);
    }
}
