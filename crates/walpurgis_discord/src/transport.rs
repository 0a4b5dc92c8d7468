//! serenity-backed implementations of the core transport traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serenity::all::{
    ChannelId, CommandInteraction, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, EditInteractionResponse, GetMessages, Http, Message,
    MessageId, UserId,
};
use tracing::{debug, warn};
use walpurgis_core::{
    Conversation, InboundMessage, Interaction, MessageSource, ReplyMatcher, ReplyRouter,
    TransportError,
};

/// Convert a gateway message into the transport-neutral form.
pub fn inbound_from_message(msg: &Message) -> InboundMessage {
    let created_at = DateTime::<Utc>::from_timestamp(msg.timestamp.unix_timestamp(), 0)
        .unwrap_or_else(Utc::now);

    InboundMessage {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author_id: msg.author.id.get(),
        author_name: msg
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| msg.author.name.clone()),
        content: msg.content.clone(),
        attachments: msg.attachments.iter().map(|a| a.url.clone()).collect(),
        created_at,
    }
}

/// Classify a serenity failure by HTTP status.
pub fn transport_error(err: serenity::Error, what: impl Into<String>) -> TransportError {
    let what = what.into();
    let status = match &err {
        serenity::Error::Http(http_err) => http_err.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    match status {
        Some(404) => TransportError::NotFound { what },
        Some(401) | Some(403) => TransportError::Forbidden { what },
        _ => TransportError::Api(err.to_string()),
    }
}

/// Snowflakes are non-zero; anything else never names a real object.
fn nonzero(id: u64, what: &str) -> Result<u64, TransportError> {
    if id == 0 {
        Err(TransportError::NotFound {
            what: what.to_string(),
        })
    } else {
        Ok(id)
    }
}

/// Channel access over the Discord REST API, with replies routed from the gateway.
#[derive(Clone)]
pub struct DiscordTransport {
    http: Arc<Http>,
    router: Arc<ReplyRouter>,
}

impl DiscordTransport {
    pub fn new(http: Arc<Http>, router: Arc<ReplyRouter>) -> Self {
        Self { http, router }
    }
}

impl std::fmt::Debug for DiscordTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordTransport")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Conversation for DiscordTransport {
    async fn send(&self, channel_id: u64, text: &str) {
        if channel_id == 0 {
            warn!("No channel configured, dropping message");
            return;
        }
        if let Err(e) = ChannelId::new(channel_id).say(&self.http, text).await {
            warn!(channel_id, "Failed to send message: {}", e);
        }
    }

    async fn send_private(&self, user_id: u64, text: &str) -> Result<(), TransportError> {
        let user = UserId::new(nonzero(user_id, "user")?);
        let dm = user
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| transport_error(e, format!("DM channel for {}", user_id)))?;
        dm.id
            .say(&self.http, text)
            .await
            .map_err(|e| transport_error(e, format!("DM to {}", user_id)))?;
        Ok(())
    }

    async fn await_reply(
        &self,
        matcher: ReplyMatcher,
        timeout: Duration,
    ) -> Option<InboundMessage> {
        self.router.wait(matcher, timeout).await
    }
}

#[async_trait]
impl MessageSource for DiscordTransport {
    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<InboundMessage, TransportError> {
        let channel = ChannelId::new(nonzero(channel_id, "channel")?);
        let id = MessageId::new(nonzero(message_id, "message")?);
        let msg = channel
            .message(&self.http, id)
            .await
            .map_err(|e| transport_error(e, format!("message {}", message_id)))?;
        Ok(inbound_from_message(&msg))
    }

    async fn history_after(
        &self,
        channel_id: u64,
        after: Option<u64>,
        limit: u8,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        let channel = ChannelId::new(nonzero(channel_id, "channel")?);
        // Paging "after" the smallest snowflake starts from the beginning of the channel
        let after = MessageId::new(after.unwrap_or(1).max(1));
        let mut page = channel
            .messages(&self.http, GetMessages::new().after(after).limit(limit))
            .await
            .map_err(|e| transport_error(e, format!("channel {}", channel_id)))?;
        page.sort_by_key(|m| m.id);
        debug!(channel_id, count = page.len(), "Fetched history page");
        Ok(page.iter().map(inbound_from_message).collect())
    }
}

/// Where the next answer to a slash command has to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Nothing sent yet; the next answer is the interaction response.
    Fresh,
    /// Deferred; the next answer replaces the "thinking" placeholder.
    Deferred,
    /// Already answered; everything else is a followup.
    Answered,
}

impl ResponseState {
    /// The state after one more answer.
    pub fn advance(self) -> Self {
        ResponseState::Answered
    }
}

/// A slash command being answered.
///
/// Interaction tokens expire after fifteen minutes, so a followup that fails
/// (typically at the end of a long backup scan) is posted to the channel instead.
pub struct SlashInteraction {
    http: Arc<Http>,
    command: CommandInteraction,
    state: Mutex<ResponseState>,
}

impl SlashInteraction {
    pub fn new(http: Arc<Http>, command: CommandInteraction) -> Self {
        Self {
            http,
            command,
            state: Mutex::new(ResponseState::Fresh),
        }
    }

    pub fn command(&self) -> &CommandInteraction {
        &self.command
    }

    /// Acknowledge now and answer later, for commands that may run past
    /// Discord's three second response window.
    pub async fn defer(&self, ephemeral: bool) -> Result<(), TransportError> {
        if *self.state.lock() != ResponseState::Fresh {
            return Ok(());
        }
        let result = if ephemeral {
            self.command.defer_ephemeral(&self.http).await
        } else {
            self.command.defer(&self.http).await
        };
        result.map_err(|e| transport_error(e, "interaction"))?;
        *self.state.lock() = ResponseState::Deferred;
        Ok(())
    }

    /// Answer with a raw response message, used for file uploads.
    pub async fn respond_with(
        &self,
        message: CreateInteractionResponseMessage,
    ) -> Result<(), TransportError> {
        self.command
            .create_response(&self.http, CreateInteractionResponse::Message(message))
            .await
            .map_err(|e| transport_error(e, "interaction"))?;
        *self.state.lock() = ResponseState::Answered;
        Ok(())
    }

    async fn answer(&self, text: &str, ephemeral: bool) {
        let state = {
            let mut state = self.state.lock();
            let current = *state;
            *state = current.advance();
            current
        };

        let result = match state {
            ResponseState::Fresh => self
                .command
                .create_response(
                    &self.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(text)
                            .ephemeral(ephemeral),
                    ),
                )
                .await
                .map(|_| ()),
            ResponseState::Deferred => self
                .command
                .edit_response(&self.http, EditInteractionResponse::new().content(text))
                .await
                .map(|_| ()),
            ResponseState::Answered => self
                .command
                .create_followup(
                    &self.http,
                    CreateInteractionResponseFollowup::new()
                        .content(text)
                        .ephemeral(ephemeral),
                )
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            warn!(
                command = %self.command.data.name,
                "Interaction reply failed, posting to channel instead: {}", e
            );
            if let Err(e) = self.command.channel_id.say(&self.http, text).await {
                warn!("Failed to send fallback message: {}", e);
            }
        }
    }
}

#[async_trait]
impl Interaction for SlashInteraction {
    fn user_id(&self) -> u64 {
        self.command.user.id.get()
    }

    fn channel_id(&self) -> u64 {
        self.command.channel_id.get()
    }

    fn guild_id(&self) -> Option<u64> {
        self.command.guild_id.map(|g| g.get())
    }

    async fn send_ephemeral(&self, text: &str) {
        self.answer(text, true).await;
    }

    async fn send_public(&self, text: &str) {
        self.answer(text, false).await;
    }
}
