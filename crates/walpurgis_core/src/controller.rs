//! The automatic archive conversation.
//!
//! Each candidate post from the submitter runs through one conversation:
//! cooldown gate, day classification, an optional dialogue to pin the day
//! down, then the commit. Conversations for different posts run concurrently
//! and only meet at the store and the tracker.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use walpurgis_db::{NewArchive, WriteMode};

use crate::context::BotContext;
use crate::cooldown::Gate;
use crate::dialogue::{day_list, Line};
use crate::error::{format_delta, ArchiveError};
use crate::inference::{classify, extract_numbers, is_affirmative, is_no, is_yes, pair_days, Inference};
use crate::transport::{Conversation, InboundMessage, ReplyMatcher};

/// How many times the submitter may correct a day after declining verification.
pub const MAX_CORRECTIONS: usize = 1;

/// How a candidate conversation ended.
#[derive(Debug)]
pub enum ArchiveOutcome {
    /// Days written, in commit order
    Committed { days: Vec<i64> },
    /// Not a candidate: wrong author or nothing attached
    Skipped,
    /// The submitter said the post is not a daily post, or declined the day
    Declined,
    Rejected(ArchiveError),
    /// The submitter stopped answering
    TimedOut,
}

impl ArchiveOutcome {
    pub fn committed_days(&self) -> &[i64] {
        match self {
            ArchiveOutcome::Committed { days } => days,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveController {
    ctx: BotContext,
}

impl ArchiveController {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// Run the full conversation for one incoming message.
    pub async fn handle_message(
        &self,
        conv: &dyn Conversation,
        msg: &InboundMessage,
        now: DateTime<Utc>,
    ) -> ArchiveOutcome {
        if msg.author_id != self.ctx.config.submitter_id {
            return ArchiveOutcome::Skipped;
        }
        let media = msg.media();
        if media.is_empty() {
            return ArchiveOutcome::Skipped;
        }

        if let Gate::Closed { elapsed, remaining } = self.ctx.tracker.check(now) {
            info!(
                message_id = msg.id,
                remaining = %format_delta(remaining),
                "Candidate rejected by cooldown"
            );
            self.notify_cooldown(conv, msg, &Line::CooldownActive {
                elapsed: format_delta(elapsed),
                remaining: format_delta(remaining),
            })
            .await;
            return ArchiveOutcome::Rejected(ArchiveError::CooldownActive { elapsed, remaining });
        }

        let inference = classify(&msg.content, &media);
        debug!(message_id = msg.id, ?inference, "Classified candidate");

        match inference {
            Inference::Series(pairs) => self.commit_series(conv, msg, pairs, now).await,
            Inference::MultipleAmbiguous { numbers } => {
                self.say(conv, msg, &Line::MultipleNumbers).await;
                ArchiveOutcome::Rejected(ArchiveError::Ambiguity {
                    numbers: numbers.len(),
                    media: media.len(),
                })
            }
            Inference::SingleExplicit(day) => {
                self.verify_and_commit(conv, msg, &media, day, now).await
            }
            Inference::NoNumber => self.ask_for_day(conv, msg, &media, now).await,
        }
    }

    /// No readable day: ask whether this is a daily post and which day it is.
    async fn ask_for_day(
        &self,
        conv: &dyn Conversation,
        msg: &InboundMessage,
        media: &[String],
        now: DateTime<Utc>,
    ) -> ArchiveOutcome {
        self.say(conv, msg, &Line::AskIfDaily { user: msg.author_id })
            .await;

        let Some(reply) = self.await_any(conv, msg).await else {
            return self.timed_out(conv, msg).await;
        };
        if is_no(&reply.content) {
            info!(message_id = msg.id, "Submitter says this is not a daily post");
            return ArchiveOutcome::Declined;
        }

        let numbers = extract_numbers(&reply.content);
        if numbers.is_empty() {
            self.say(conv, msg, &Line::CouldntParseReply).await;
            return ArchiveOutcome::Rejected(ArchiveError::parse(reply.content));
        }
        if numbers.len() >= 2 && media.len() >= 2 {
            let pairs = pair_days(&numbers, media);
            return self.commit_series(conv, msg, pairs, now).await;
        }

        self.verify_and_commit(conv, msg, media, numbers[0], now)
            .await
    }

    /// Confirm an out-of-sequence day with the submitter, then commit it.
    async fn verify_and_commit(
        &self,
        conv: &dyn Conversation,
        msg: &InboundMessage,
        media: &[String],
        day: i64,
        now: DateTime<Utc>,
    ) -> ArchiveOutcome {
        let mut day = day;
        let mut corrections_left = MAX_CORRECTIONS;

        loop {
            if day < 1 {
                self.say(conv, msg, &Line::ParseError { msg_id: msg.id }).await;
                return ArchiveOutcome::Rejected(ArchiveError::parse(day.to_string()));
            }

            let expected = self.ctx.tracker.current().expected_next_day;
            if day == expected {
                break;
            }

            debug!(day, expected, "Day is out of sequence, asking for confirmation");
            self.say(conv, msg, &Line::VerificationPrompt { provided: day })
                .await;
            let matcher = ReplyMatcher::yes_no(msg.author_id, msg.channel_id);
            let Some(reply) = conv.await_reply(matcher, self.ctx.config.reply_timeout()).await
            else {
                return self.timed_out(conv, msg).await;
            };

            if is_yes(&reply.content) {
                self.say(conv, msg, &Line::VerificationAccepted { provided: day })
                    .await;
                break;
            }

            if corrections_left == 0 {
                self.say(conv, msg, &Line::NotArchived { msg_id: msg.id }).await;
                return ArchiveOutcome::Declined;
            }
            corrections_left -= 1;

            self.say(conv, msg, &Line::VerificationDenied).await;
            self.say(conv, msg, &Line::AskIfDaily { user: msg.author_id })
                .await;
            let Some(reply) = self.await_any(conv, msg).await else {
                return self.timed_out(conv, msg).await;
            };
            if !is_affirmative(&reply.content) {
                self.say(conv, msg, &Line::NotArchived { msg_id: msg.id }).await;
                return ArchiveOutcome::Declined;
            }

            self.say(
                conv,
                msg,
                &Line::ProvideDayNumber {
                    user: msg.author_id,
                    msg_id: msg.id,
                },
            )
            .await;
            let Some(reply) = self.await_any(conv, msg).await else {
                return self.timed_out(conv, msg).await;
            };
            match extract_numbers(&reply.content).first() {
                Some(corrected) => day = *corrected,
                None => {
                    self.say(conv, msg, &Line::CouldntParseReply).await;
                    return ArchiveOutcome::Rejected(ArchiveError::parse(reply.content));
                }
            }
        }

        self.commit_single(conv, msg, media, day, now).await
    }

    async fn commit_single(
        &self,
        conv: &dyn Conversation,
        msg: &InboundMessage,
        media: &[String],
        day: i64,
        now: DateTime<Utc>,
    ) -> ArchiveOutcome {
        match self.ctx.db.find_by_day(day).await {
            Ok(Some(existing)) if existing.origin_message_id != msg.id.to_string() => {
                self.say(conv, msg, &Line::DayAlreadyArchived { day }).await;
                return ArchiveOutcome::Rejected(ArchiveError::DayConflict { day });
            }
            Ok(_) => {}
            Err(e) => return self.failed(conv, msg, e.into()).await,
        }

        // Another conversation can claim the day between the lookup and the write
        match self
            .commit(msg, day, media.to_vec(), WriteMode::SameOrigin, now)
            .await
        {
            Ok(()) => {
                self.say(conv, msg, &Line::AutoArchived { day }).await;
                ArchiveOutcome::Committed { days: vec![day] }
            }
            Err(ArchiveError::DayConflict { day }) => {
                self.say(conv, msg, &Line::DayAlreadyArchived { day }).await;
                ArchiveOutcome::Rejected(ArchiveError::DayConflict { day })
            }
            Err(e) => self.failed(conv, msg, e).await,
        }
    }

    /// Commit each `(day, media)` pair on its own. Days that are already
    /// archived are reported and skipped; the rest still go through.
    async fn commit_series(
        &self,
        conv: &dyn Conversation,
        msg: &InboundMessage,
        pairs: Vec<(i64, String)>,
        now: DateTime<Utc>,
    ) -> ArchiveOutcome {
        let mut committed = Vec::new();
        let mut last_error = None;

        for (day, media) in pairs {
            if day < 1 {
                self.say(conv, msg, &Line::ParseError { msg_id: msg.id }).await;
                last_error = Some(ArchiveError::parse(day.to_string()));
                continue;
            }
            match self.ctx.db.find_by_day(day).await {
                Ok(Some(_)) => {
                    self.say(conv, msg, &Line::DayAlreadyArchived { day }).await;
                    last_error = Some(ArchiveError::DayConflict { day });
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    let err: ArchiveError = e.into();
                    self.say(conv, msg, &Line::from_error(&err)).await;
                    last_error = Some(err);
                    continue;
                }
            }

            match self
                .commit(msg, day, vec![media], WriteMode::InsertOnly, now)
                .await
            {
                Ok(()) => committed.push(day),
                Err(ArchiveError::DayConflict { day }) => {
                    self.say(conv, msg, &Line::DayAlreadyArchived { day }).await;
                    last_error = Some(ArchiveError::DayConflict { day });
                }
                Err(err) => {
                    self.say(conv, msg, &Line::from_error(&err)).await;
                    last_error = Some(err);
                }
            }
        }

        if !committed.is_empty() {
            self.say(
                conv,
                msg,
                &Line::AutoArchivedSeries {
                    days: day_list(&committed),
                },
            )
            .await;
            return ArchiveOutcome::Committed { days: committed };
        }

        match last_error {
            Some(err) => ArchiveOutcome::Rejected(err),
            None => ArchiveOutcome::Declined,
        }
    }

    /// Write one day and advance the tracker.
    async fn commit(
        &self,
        msg: &InboundMessage,
        day: i64,
        media_refs: Vec<String>,
        mode: WriteMode,
        now: DateTime<Utc>,
    ) -> Result<(), ArchiveError> {
        let new = NewArchive {
            day,
            media_refs,
            origin_message_id: msg.id.to_string(),
            origin_channel_id: Some(msg.channel_id.to_string()),
            submitter_id: Some(msg.author_id.to_string()),
            submitter_display: Some(msg.author_name.clone()),
            timestamp: self.ctx.local_timestamp(now),
        };
        let outcome = self.ctx.db.upsert_with(&new, mode).await?;
        self.ctx.tracker.record_commit(day, now);
        info!(day, message_id = msg.id, ?outcome, "Archived daily post");
        Ok(())
    }

    async fn notify_cooldown(&self, conv: &dyn Conversation, msg: &InboundMessage, line: &Line) {
        let text = self.ctx.say(line);
        if let Err(e) = conv.send_private(msg.author_id, &text).await {
            debug!("Cooldown DM failed ({}), falling back to channel", e);
            conv.send(msg.channel_id, &format!("<@{}> {}", msg.author_id, text))
                .await;
        }
    }

    async fn await_any(&self, conv: &dyn Conversation, msg: &InboundMessage) -> Option<InboundMessage> {
        let matcher = ReplyMatcher::any(msg.author_id, msg.channel_id);
        conv.await_reply(matcher, self.ctx.config.reply_timeout())
            .await
    }

    async fn timed_out(&self, conv: &dyn Conversation, msg: &InboundMessage) -> ArchiveOutcome {
        info!(message_id = msg.id, "No reply from submitter, aborting");
        self.say(conv, msg, &Line::NoResponse).await;
        ArchiveOutcome::TimedOut
    }

    async fn failed(
        &self,
        conv: &dyn Conversation,
        msg: &InboundMessage,
        err: ArchiveError,
    ) -> ArchiveOutcome {
        warn!(message_id = msg.id, "Archive failed: {}", err);
        self.say(conv, msg, &Line::from_error(&err)).await;
        ArchiveOutcome::Rejected(err)
    }

    async fn say(&self, conv: &dyn Conversation, msg: &InboundMessage, line: &Line) {
        conv.send(msg.channel_id, &self.ctx.say(line)).await;
    }
}
