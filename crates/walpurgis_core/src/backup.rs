//! Backfilling the archive from channel history.
//!
//! A scan walks each channel oldest-first and archives the submitter's posts
//! that are not in the archive yet. Existing days are never overwritten. Only
//! one scan runs at a time, and `panic_stop` cancels it between messages.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use walpurgis_db::{DbError, NewArchive, WriteMode};

use crate::context::BotContext;
use crate::error::{ArchiveError, CoreResult};
use crate::inference::{classify, extract_numbers, is_no, pair_days, Inference};
use crate::transport::{Conversation, InboundMessage, Interaction, MessageSource, ReplyMatcher};

/// Messages fetched per history request.
pub const HISTORY_PAGE_SIZE: u8 = 100;

/// What a scan did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub archived: Vec<i64>,
    /// Days found in history that the archive already had
    pub skipped_existing: Vec<i64>,
    pub failed_channels: Vec<u64>,
    /// Cancelled by `panic_stop` before finishing
    pub stopped: bool,
}

impl ScanReport {
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Backup {}: scanned {} messages, archived {} days, skipped {} existing days.",
            if self.stopped { "stopped" } else { "completed" },
            self.scanned,
            self.archived.len(),
            self.skipped_existing.len()
        );
        if !self.failed_channels.is_empty() {
            let channels: Vec<String> = self
                .failed_channels
                .iter()
                .map(|c| format!("<#{}>", c))
                .collect();
            text.push_str(&format!(" Could not read: {}.", channels.join(", ")));
        }
        text
    }
}

#[derive(Debug)]
pub struct BackupScanner {
    ctx: BotContext,
    running: Mutex<Option<CancellationToken>>,
}

/// Clears the running slot when a scan ends, however it ends.
struct RunGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

impl BackupScanner {
    pub fn new(ctx: BotContext) -> Self {
        Self {
            ctx,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Cancel the running scan. Returns false when nothing was running.
    pub fn panic_stop(&self) -> bool {
        match self.running.lock().as_ref() {
            Some(token) => {
                token.cancel();
                info!("Backup scan cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Scan `channel_ids` (comma or space separated ids or channel mentions).
    pub async fn scrape(
        &self,
        source: &dyn MessageSource,
        conv: &dyn Conversation,
        interaction: &dyn Interaction,
        channel_ids: &str,
        password: &str,
    ) -> CoreResult<ScanReport> {
        if self.ctx.config.backup_password.as_deref() != Some(password) {
            interaction.send_ephemeral("Incorrect password.").await;
            return Err(ArchiveError::BadPassword);
        }

        let channels = parse_channel_list(channel_ids);
        if channels.is_empty() {
            interaction
                .send_ephemeral("Please provide at least one channel id.")
                .await;
            return Err(ArchiveError::invalid_input("no channel ids given"));
        }

        let claimed = {
            let mut slot = self.running.lock();
            if slot.is_some() {
                None
            } else {
                let token = CancellationToken::new();
                *slot = Some(token.clone());
                Some(token)
            }
        };
        let Some(token) = claimed else {
            interaction
                .send_ephemeral("A backup scan is already running.")
                .await;
            return Err(ArchiveError::BackupAlreadyRunning);
        };
        let _guard = RunGuard {
            slot: &self.running,
        };

        info!(channels = ?channels, "Starting backup scan");
        interaction
            .send_ephemeral(&format!(
                "Starting backup scan of {} channel(s)...",
                channels.len()
            ))
            .await;

        let mut report = ScanReport::default();
        'channels: for channel_id in channels {
            let mut after = None;
            loop {
                if token.is_cancelled() {
                    report.stopped = true;
                    break 'channels;
                }

                let page = match source
                    .history_after(channel_id, after, HISTORY_PAGE_SIZE)
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        let err = ArchiveError::ChannelUnavailable {
                            channel_id,
                            reason: e.to_string(),
                        };
                        warn!("Backup scan skipping channel: {}", err);
                        interaction
                            .send_ephemeral(&format!("{}. Skipping.", err))
                            .await;
                        report.failed_channels.push(channel_id);
                        continue 'channels;
                    }
                };
                let last_page = page.len() < HISTORY_PAGE_SIZE as usize;

                for msg in page {
                    if token.is_cancelled() {
                        report.stopped = true;
                        break 'channels;
                    }
                    after = Some(msg.id);
                    report.scanned += 1;
                    self.process(conv, interaction, &token, &msg, &mut report)
                        .await;
                }

                if last_page {
                    break;
                }
            }
        }

        self.ctx.resync_tracker().await?;
        info!(
            scanned = report.scanned,
            archived = report.archived.len(),
            stopped = report.stopped,
            "Backup scan finished"
        );
        interaction.send_ephemeral(&report.summary()).await;
        Ok(report)
    }

    async fn process(
        &self,
        conv: &dyn Conversation,
        interaction: &dyn Interaction,
        token: &CancellationToken,
        msg: &InboundMessage,
        report: &mut ScanReport,
    ) {
        if msg.author_id != self.ctx.config.submitter_id {
            return;
        }
        let media = msg.media();
        if media.is_empty() {
            return;
        }

        let placements = match classify(&msg.content, &media) {
            Inference::SingleExplicit(day) => vec![(day, media)],
            Inference::Series(pairs) => singles(pairs),
            Inference::NoNumber | Inference::MultipleAmbiguous { .. } => {
                match self.ask_operator(conv, interaction, token, msg, &media).await {
                    Some(placements) => placements,
                    None => return,
                }
            }
        };

        for (day, media_refs) in placements {
            self.store(msg, day, media_refs, report).await;
        }
    }

    /// Ask the operator for the day of a message we could not read. `None` skips it.
    async fn ask_operator(
        &self,
        conv: &dyn Conversation,
        interaction: &dyn Interaction,
        token: &CancellationToken,
        msg: &InboundMessage,
        media: &[String],
    ) -> Option<Vec<(i64, Vec<String>)>> {
        interaction
            .send_ephemeral(&format!(
                "Could not work out the day for {} (\"{}\"). Reply with the day number(s), or 'no' to skip.",
                msg.jump_link(),
                msg.content
            ))
            .await;

        let matcher = ReplyMatcher::any(interaction.user_id(), interaction.channel_id());
        let reply = tokio::select! {
            reply = conv.await_reply(matcher, self.ctx.config.reply_timeout()) => reply,
            _ = token.cancelled() => return None,
        };
        let Some(reply) = reply else {
            interaction
                .send_ephemeral("Timed out waiting for a day number. Skipping message.")
                .await;
            return None;
        };
        if is_no(&reply.content) {
            interaction.send_ephemeral("Skipping message.").await;
            return None;
        }

        let numbers = extract_numbers(&reply.content);
        match numbers.as_slice() {
            [] => {
                interaction
                    .send_ephemeral("No valid day numbers provided. Skipping.")
                    .await;
                None
            }
            [day] => Some(vec![(*day, media.to_vec())]),
            _ if media.len() >= 2 => Some(singles(pair_days(&numbers, media))),
            [day, ..] => Some(vec![(*day, media.to_vec())]),
        }
    }

    async fn store(&self, msg: &InboundMessage, day: i64, media_refs: Vec<String>, report: &mut ScanReport) {
        if day < 1 {
            debug!(message_id = msg.id, day, "Ignoring non-positive day");
            return;
        }
        match self.ctx.db.find_by_day(day).await {
            Ok(Some(_)) => {
                report.skipped_existing.push(day);
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(day, "Backup lookup failed: {}", e);
                return;
            }
        }

        let new = NewArchive {
            day,
            media_refs,
            origin_message_id: msg.id.to_string(),
            origin_channel_id: Some(msg.channel_id.to_string()),
            submitter_id: Some(msg.author_id.to_string()),
            submitter_display: Some(msg.author_name.clone()),
            timestamp: self.ctx.local_timestamp(msg.created_at),
        };
        match self.ctx.db.upsert_with(&new, WriteMode::InsertOnly).await {
            Ok(_) => {
                debug!(day, message_id = msg.id, "Backfilled day");
                report.archived.push(day);
            }
            Err(DbError::DayConflict { .. }) => report.skipped_existing.push(day),
            Err(e) => warn!(day, message_id = msg.id, "Backfill failed: {}", e),
        }
    }
}

fn singles(pairs: Vec<(i64, String)>) -> Vec<(i64, Vec<String>)> {
    pairs.into_iter().map(|(day, m)| (day, vec![m])).collect()
}

/// Channel ids from `"123, 456"` or `"<#123> <#456>"`.
pub fn parse_channel_list(input: &str) -> Vec<u64> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|token| token.trim_start_matches("<#").trim_end_matches('>'))
        .filter_map(|token| token.parse().ok())
        .collect()
}
