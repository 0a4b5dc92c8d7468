//! Walpurgis Discord - gateway binding for the archive bot
//!
//! This crate connects the core archive flow to Discord through serenity:
//! gateway events feed the reply router and the archive controller, slash
//! commands map onto the core command operations, and the scheduled tasks
//! post through the same transport.
//!
//! ## Configuration
//!
//! The token and command registration scope come from
//! `DiscordBotConfig::from_env()`. Everything else is the core `BotConfig`.

pub mod bot;
pub mod config;
pub mod error;
pub mod slash_commands;
pub mod transport;

pub use bot::{run_bot, Services, WalpurgisHandler};
pub use config::DiscordBotConfig;
pub use error::{DiscordError, Result};
pub use transport::{DiscordTransport, SlashInteraction};

// Re-export serenity for convenience
pub use serenity;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        run_bot, DiscordBotConfig, DiscordError, DiscordTransport, Result, Services,
        SlashInteraction, WalpurgisHandler,
    };
}
