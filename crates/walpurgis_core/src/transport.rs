//! Chat transport seams.
//!
//! The archive logic talks to chat only through these traits so conversations
//! can be driven by the Discord gateway in production and by scripted doubles
//! in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use thiserror::Error;

use walpurgis_db::MAX_MEDIA_SLOTS;

use crate::inference::{is_no, is_yes};

/// A chat message as the archive logic sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: u64,
    pub channel_id: u64,
    /// `None` for direct messages
    pub guild_id: Option<u64>,
    pub author_id: u64,
    pub author_name: String,
    pub content: String,
    /// Attachment URLs in posting order
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl InboundMessage {
    /// The attachments an entry can hold, in order.
    pub fn media(&self) -> Vec<String> {
        self.attachments
            .iter()
            .take(MAX_MEDIA_SLOTS)
            .cloned()
            .collect()
    }

    /// Jump link back to this message.
    pub fn jump_link(&self) -> String {
        jump_link(self.guild_id, self.channel_id, self.id)
    }
}

/// Build a `https://discord.com/channels/...` link. DMs use `@me` in place of the guild.
pub fn jump_link(guild_id: Option<u64>, channel_id: u64, message_id: u64) -> String {
    let guild = guild_id
        .map(|g| g.to_string())
        .unwrap_or_else(|| "@me".to_string());
    format!(
        "https://discord.com/channels/{}/{}/{}",
        guild, channel_id, message_id
    )
}

/// Which replies a waiter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Any,
    /// Only `yes`/`y`/`no`/`n`; anything else is left for other handlers
    YesNo,
}

/// Selects the reply a conversation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyMatcher {
    pub author_id: u64,
    pub channel_id: u64,
    pub accept: Accept,
}

impl ReplyMatcher {
    pub fn any(author_id: u64, channel_id: u64) -> Self {
        Self {
            author_id,
            channel_id,
            accept: Accept::Any,
        }
    }

    pub fn yes_no(author_id: u64, channel_id: u64) -> Self {
        Self {
            author_id,
            channel_id,
            accept: Accept::YesNo,
        }
    }

    pub fn matches(&self, msg: &InboundMessage) -> bool {
        if msg.author_id != self.author_id || msg.channel_id != self.channel_id {
            return false;
        }
        match self.accept {
            Accept::Any => true,
            Accept::YesNo => is_yes(&msg.content) || is_no(&msg.content),
        }
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum TransportError {
    #[error("{what} was not found")]
    #[diagnostic(code(walpurgis_core::transport::not_found))]
    NotFound { what: String },

    #[error("Missing permission for {what}")]
    #[diagnostic(code(walpurgis_core::transport::forbidden))]
    Forbidden { what: String },

    #[error("Chat API error: {0}")]
    #[diagnostic(code(walpurgis_core::transport::api))]
    Api(String),
}

/// Sending messages and waiting for replies.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Post to a channel. Delivery failures are logged by the implementation, not returned.
    async fn send(&self, channel_id: u64, text: &str);

    /// Direct-message a user.
    async fn send_private(&self, user_id: u64, text: &str) -> Result<(), TransportError>;

    /// Wait for the next message matching `matcher`. `None` means the wait timed out.
    async fn await_reply(&self, matcher: ReplyMatcher, timeout: Duration)
        -> Option<InboundMessage>;
}

/// Read access to channel history.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<InboundMessage, TransportError>;

    /// Up to `limit` messages posted after `after` (or from the start of the
    /// channel), oldest first.
    async fn history_after(
        &self,
        channel_id: u64,
        after: Option<u64>,
        limit: u8,
    ) -> Result<Vec<InboundMessage>, TransportError>;
}

/// A slash-command invocation being answered.
#[async_trait]
pub trait Interaction: Send + Sync {
    fn user_id(&self) -> u64;
    fn channel_id(&self) -> u64;
    fn guild_id(&self) -> Option<u64>;

    /// Answer visible only to the invoking user.
    async fn send_ephemeral(&self, text: &str);

    /// Answer visible to the whole channel.
    async fn send_public(&self, text: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(author_id: u64, channel_id: u64, content: &str) -> InboundMessage {
        InboundMessage {
            id: 1,
            channel_id,
            guild_id: Some(5),
            author_id,
            author_name: "johan".to_string(),
            content: content.to_string(),
            attachments: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_yes_no_matcher_ignores_other_text() {
        let matcher = ReplyMatcher::yes_no(1, 2);
        assert!(matcher.matches(&message(1, 2, "Yes")));
        assert!(matcher.matches(&message(1, 2, "n")));
        assert!(!matcher.matches(&message(1, 2, "Day 4")));
        assert!(!matcher.matches(&message(9, 2, "yes")));
        assert!(!matcher.matches(&message(1, 3, "yes")));
    }

    #[test]
    fn test_media_is_capped() {
        assert_eq!(message(1, 2, "").media(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_jump_links() {
        assert_eq!(
            message(1, 2, "").jump_link(),
            "https://discord.com/channels/5/2/1"
        );
        assert_eq!(jump_link(None, 2, 3), "https://discord.com/channels/@me/2/3");
    }
}
