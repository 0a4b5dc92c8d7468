#![cfg(test)]

pub mod fixtures {
    use chrono::{DateTime, Utc};

    use walpurgis_db::ArchiveDb;

    use crate::config::BotConfig;
    use crate::context::BotContext;
    use crate::transport::InboundMessage;

    pub const JOHAN: u64 = 1000;
    pub const CHANNEL: u64 = 2000;
    pub const GUILD: u64 = 3000;

    pub fn test_config() -> BotConfig {
        BotConfig {
            submitter_id: JOHAN,
            default_channel_id: CHANNEL,
            timezone: "UTC".to_string(),
            backup_password: Some("hunter2".to_string()),
            ..Default::default()
        }
    }

    /// Context over a fresh in-memory store.
    pub async fn test_context() -> BotContext {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        BotContext::new(test_config(), db).await.unwrap()
    }

    pub fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    /// A post by the submitter in the test channel with `media` attachments.
    pub fn post(id: u64, content: &str, media: usize) -> InboundMessage {
        InboundMessage {
            id,
            channel_id: CHANNEL,
            guild_id: Some(GUILD),
            author_id: JOHAN,
            author_name: "johan".to_string(),
            content: content.to_string(),
            attachments: (1..=media)
                .map(|i| format!("https://cdn.test/{}/{}.png", id, i))
                .collect(),
            created_at: at("2024-05-01T12:00:00Z"),
        }
    }
}

pub mod transport {
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    use crate::transport::{
        Conversation, InboundMessage, Interaction, MessageSource, ReplyMatcher, TransportError,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Channel(u64, String),
        Private(u64, String),
    }

    /// Conversation double that plays back canned replies.
    ///
    /// Each `await_reply` pops the next scripted reply; `None` (or an empty
    /// script) behaves like a timeout.
    #[derive(Debug, Default)]
    pub struct ScriptedConversation {
        replies: Mutex<VecDeque<Option<String>>>,
        sent: Mutex<Vec<Sent>>,
        dm_fails: bool,
    }

    impl ScriptedConversation {
        pub fn new<'a>(replies: impl IntoIterator<Item = Option<&'a str>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
                ..Default::default()
            }
        }

        pub fn silent() -> Self {
            Self::default()
        }

        pub fn with_failing_dms(mut self) -> Self {
            self.dm_fails = true;
            self
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
        }

        /// Texts posted to channels, in order.
        pub fn channel_texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter_map(|s| match s {
                    Sent::Channel(_, text) => Some(text.clone()),
                    Sent::Private(..) => None,
                })
                .collect()
        }

        pub fn unused_replies(&self) -> usize {
            self.replies.lock().len()
        }
    }

    #[async_trait]
    impl Conversation for ScriptedConversation {
        async fn send(&self, channel_id: u64, text: &str) {
            self.sent
                .lock()
                .push(Sent::Channel(channel_id, text.to_string()));
        }

        async fn send_private(&self, user_id: u64, text: &str) -> Result<(), TransportError> {
            if self.dm_fails {
                return Err(TransportError::Forbidden {
                    what: "direct messages".to_string(),
                });
            }
            self.sent
                .lock()
                .push(Sent::Private(user_id, text.to_string()));
            Ok(())
        }

        async fn await_reply(
            &self,
            matcher: ReplyMatcher,
            _timeout: Duration,
        ) -> Option<InboundMessage> {
            let content = self.replies.lock().pop_front().flatten()?;
            Some(InboundMessage {
                id: 9_999,
                channel_id: matcher.channel_id,
                guild_id: None,
                author_id: matcher.author_id,
                author_name: "replier".to_string(),
                content,
                attachments: Vec::new(),
                created_at: Utc::now(),
            })
        }
    }

    /// Interaction double that records what it was answered with.
    #[derive(Debug)]
    pub struct RecordingInteraction {
        pub user_id: u64,
        pub channel_id: u64,
        responses: Mutex<Vec<String>>,
    }

    impl RecordingInteraction {
        pub fn new(user_id: u64, channel_id: u64) -> Self {
            Self {
                user_id,
                channel_id,
                responses: Mutex::new(Vec::new()),
            }
        }

        pub fn responses(&self) -> Vec<String> {
            self.responses.lock().clone()
        }

        pub fn last(&self) -> Option<String> {
            self.responses.lock().last().cloned()
        }
    }

    #[async_trait]
    impl Interaction for RecordingInteraction {
        fn user_id(&self) -> u64 {
            self.user_id
        }

        fn channel_id(&self) -> u64 {
            self.channel_id
        }

        fn guild_id(&self) -> Option<u64> {
            Some(super::fixtures::GUILD)
        }

        async fn send_ephemeral(&self, text: &str) {
            self.responses.lock().push(text.to_string());
        }

        async fn send_public(&self, text: &str) {
            self.responses.lock().push(text.to_string());
        }
    }

    /// In-memory channel history.
    #[derive(Debug, Default)]
    pub struct FakeHistory {
        channels: HashMap<u64, Vec<InboundMessage>>,
        unavailable: HashSet<u64>,
    }

    impl FakeHistory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Messages are kept in id order regardless of insertion order.
        pub fn with_message(mut self, msg: InboundMessage) -> Self {
            let channel = self.channels.entry(msg.channel_id).or_default();
            channel.push(msg);
            channel.sort_by_key(|m| m.id);
            self
        }

        pub fn with_unavailable(mut self, channel_id: u64) -> Self {
            self.unavailable.insert(channel_id);
            self
        }
    }

    #[async_trait]
    impl MessageSource for FakeHistory {
        async fn fetch_message(
            &self,
            channel_id: u64,
            message_id: u64,
        ) -> Result<InboundMessage, TransportError> {
            self.channels
                .get(&channel_id)
                .and_then(|msgs| msgs.iter().find(|m| m.id == message_id))
                .cloned()
                .ok_or_else(|| TransportError::NotFound {
                    what: format!("message {}", message_id),
                })
        }

        async fn history_after(
            &self,
            channel_id: u64,
            after: Option<u64>,
            limit: u8,
        ) -> Result<Vec<InboundMessage>, TransportError> {
            if self.unavailable.contains(&channel_id) {
                return Err(TransportError::Forbidden {
                    what: format!("channel {}", channel_id),
                });
            }
            Ok(self
                .channels
                .get(&channel_id)
                .map(|msgs| {
                    msgs.iter()
                        .filter(|m| after.map_or(true, |a| m.id > a))
                        .take(limit as usize)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }
}
