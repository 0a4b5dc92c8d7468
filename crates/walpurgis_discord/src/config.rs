//! Discord credentials and command registration scope.

use tracing::warn;

/// Discord bot configuration.
///
/// Only the transport concerns live here; archive behaviour is configured
/// through the core `BotConfig`.
#[derive(Debug, Clone)]
pub struct DiscordBotConfig {
    /// Discord bot token (required).
    pub bot_token: String,
    /// Guilds to register slash commands in. Empty registers them globally.
    pub command_guilds: Vec<u64>,
}

impl DiscordBotConfig {
    /// Load Discord bot configuration from environment variables.
    ///
    /// Returns `None` if `DISCORD_TOKEN` is not set.
    ///
    /// # Environment Variables
    ///
    /// - `DISCORD_TOKEN` -> bot_token (required for Some result)
    /// - `DISCORD_GUILD_IDS` or `DISCORD_GUILD_ID` (comma-separated) -> command_guilds
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("DISCORD_TOKEN").ok()?;

        let command_guilds = std::env::var("DISCORD_GUILD_IDS")
            .ok()
            .or_else(|| std::env::var("DISCORD_GUILD_ID").ok())
            .map(|s| parse_ids(&s))
            .unwrap_or_default();

        Some(Self {
            bot_token,
            command_guilds,
        })
    }
}

/// Parse a comma-separated string into a Vec of trimmed, non-empty strings.
fn parse_comma_separated(s: &str) -> Vec<String> {
    s.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Parse comma-separated snowflakes, skipping (and logging) anything that isn't one.
fn parse_ids(s: &str) -> Vec<u64> {
    parse_comma_separated(s)
        .into_iter()
        .filter_map(|part| match part.parse::<u64>() {
            Ok(0) | Err(_) => {
                warn!("Ignoring invalid Discord id '{}'", part);
                None
            }
            Ok(id) => Some(id),
        })
        .collect()
}
