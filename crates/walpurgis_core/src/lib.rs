//! Walpurgis Core - archive conversations for the daily post bot
//!
//! This crate holds everything that decides what gets archived:
//! - Day inference from post text
//! - The automatic archive conversation with its cooldown gate
//! - Operator commands, backup scans and scheduled reminders
//! - Persona-worded notices
//!
//! Chat access goes through the traits in [`transport`], so the whole flow
//! runs against scripted doubles in tests.

pub mod backup;
pub mod commands;
pub mod config;
pub mod context;
pub mod controller;
pub mod cooldown;
pub mod dialogue;
pub mod error;
pub mod inference;
pub mod reminder;
pub mod router;
pub mod transport;
pub mod triggers;

#[cfg(test)]
pub mod test_helpers;

pub use backup::{BackupScanner, ScanReport};
pub use config::{load_config, load_config_from_standard_locations, BotConfig};
pub use context::BotContext;
pub use controller::{ArchiveController, ArchiveOutcome};
pub use cooldown::{CooldownState, CooldownTracker, Gate};
pub use dialogue::{Dialogue, Line, Persona};
pub use error::{ArchiveError, ConfigError, CoreResult};
pub use router::ReplyRouter;
pub use transport::{
    Conversation, InboundMessage, Interaction, MessageSource, ReplyMatcher, TransportError,
};

// Re-export the store so callers need only one dependency for the common types
pub use walpurgis_db::{ArchiveDb, ArchiveEntry, ImportReport};
