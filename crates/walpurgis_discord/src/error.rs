use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscordError>;

#[derive(Error, Diagnostic, Debug)]
pub enum DiscordError {
    #[error("Discord client error: {0}")]
    #[diagnostic(
        code(walpurgis_discord::client),
        help("Check DISCORD_TOKEN and that the bot has the message content intent enabled")
    )]
    Client(#[from] serenity::Error),

    #[error("Command option '{name}' is missing or has the wrong type")]
    #[diagnostic(code(walpurgis_discord::option))]
    BadOption { name: String },

    #[error("Could not read uploaded file: {reason}")]
    #[diagnostic(code(walpurgis_discord::attachment))]
    Attachment { reason: String },
}
