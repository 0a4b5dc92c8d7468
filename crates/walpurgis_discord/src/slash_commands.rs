//! Discord slash command implementations

use chrono::Utc;
use miette::Result;
use serenity::{
    builder::{
        CreateAttachment, CreateCommand, CreateCommandOption, CreateInteractionResponse,
        CreateInteractionResponseMessage,
    },
    client::Context,
    model::application::{CommandDataOptionValue, CommandInteraction, CommandOptionType},
};
use tracing::{debug, info, warn};
use walpurgis_core::{commands, Interaction, Persona};

use crate::bot::Services;
use crate::error::DiscordError;
use crate::transport::{DiscordTransport, SlashInteraction};

pub const EXPORT_FILE_NAME: &str = "daily_johans.json";

/// Create all slash commands for registration
pub fn create_commands() -> Vec<CreateCommand> {
    let mut persona = CreateCommandOption::new(
        CommandOptionType::String,
        "name",
        "Which voice the bot should use",
    )
    .required(true);
    for p in Persona::ALL {
        persona = persona.add_string_choice(p.as_str(), p.as_str());
    }

    vec![
        CreateCommand::new("manual_archive")
            .description("Archive an existing message for the given days")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "message",
                    "Message id in this channel, or a message link",
                )
                .required(true),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "days",
                    "Day numbers, comma or space separated",
                )
                .required(true),
            ),
        CreateCommand::new("delete")
            .description("Delete an archived day, or every day a message backs")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "day", "Day to delete")
                    .min_int_value(1)
                    .required(false),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "message_link",
                    "Link to the archived message",
                )
                .required(false),
            ),
        CreateCommand::new("search")
            .description("Show the archived post for a day")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "day", "Day number")
                    .min_int_value(1)
                    .required(true),
            ),
        CreateCommand::new("status")
            .description("Show which days are archived")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "start", "First day (default 1)")
                    .min_int_value(1)
                    .required(false),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "end",
                    "Last day (default: highest archived day)",
                )
                .min_int_value(1)
                .required(false),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                    .min_int_value(1)
                    .required(false),
            ),
        CreateCommand::new("persona")
            .description("Switch the bot's persona")
            .add_option(persona),
        CreateCommand::new("debug_info").description("Show cooldown and sequence state"),
        CreateCommand::new("scrape_backup")
            .description("Backfill the archive from channel history")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "channels",
                    "Channel ids or mentions, comma or space separated",
                )
                .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "password", "Backup password")
                    .required(true),
            ),
        CreateCommand::new("panic_stop").description("Stop a running backup scan"),
        CreateCommand::new("export_db").description("Download the archive as JSON"),
        CreateCommand::new("import_db")
            .description("Import archive entries from a JSON file")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Attachment,
                    "file",
                    "JSON export to import",
                )
                .required(true),
            ),
    ]
}

fn str_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn required_str<'a>(command: &'a CommandInteraction, name: &str) -> Result<&'a str> {
    str_option(command, name).ok_or_else(|| {
        DiscordError::BadOption {
            name: name.to_string(),
        }
        .into()
    })
}

async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await
        .map_err(|e| miette::miette!("Failed to send response: {}", e))
}

/// Route a slash command to its handler.
pub async fn dispatch(ctx: &Context, command: &CommandInteraction, services: &Services) -> Result<()> {
    debug!(
        command = %command.data.name,
        user = command.user.id.get(),
        "Slash command received"
    );
    match command.data.name.as_str() {
        "manual_archive" => handle_manual_archive(ctx, command, services).await,
        "delete" => handle_delete(ctx, command, services).await,
        "search" => handle_search(ctx, command, services).await,
        "status" => handle_status(ctx, command, services).await,
        "persona" => handle_persona(ctx, command, services).await,
        "debug_info" => handle_debug_info(ctx, command, services).await,
        "scrape_backup" => handle_scrape_backup(ctx, command, services).await,
        "panic_stop" => handle_panic_stop(ctx, command, services).await,
        "export_db" => handle_export(ctx, command, services).await,
        "import_db" => handle_import(ctx, command, services).await,
        other => {
            warn!("Unknown slash command: {}", other);
            reply_ephemeral(ctx, command, "Unknown command.").await
        }
    }
}

// Core operations answer the user themselves; their errors are only logged here.
fn log_outcome<T>(name: &str, result: walpurgis_core::CoreResult<T>) -> Result<()> {
    if let Err(e) = result {
        debug!(command = name, "Command refused: {}", e);
    }
    Ok(())
}

pub async fn handle_manual_archive(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let message_ref = required_str(command, "message")?;
    let days = required_str(command, "days")?;

    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    let transport = DiscordTransport::new(ctx.http.clone(), services.router.clone());
    let result = commands::manual_archive(
        &services.context,
        &transport,
        &interaction,
        message_ref,
        days,
        Utc::now(),
    )
    .await;
    log_outcome("manual_archive", result)
}

pub async fn handle_delete(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let day = int_option(command, "day");
    let link = str_option(command, "message_link");

    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    let transport = DiscordTransport::new(ctx.http.clone(), services.router.clone());
    let result = commands::delete(&services.context, &transport, &interaction, day, link).await;
    log_outcome("delete", result)
}

pub async fn handle_search(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let Some(day) = int_option(command, "day") else {
        return Err(DiscordError::BadOption {
            name: "day".to_string(),
        }
        .into());
    };

    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    let result = commands::search(&services.context, &interaction, day).await;
    log_outcome("search", result)
}

pub async fn handle_status(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let start = int_option(command, "start").unwrap_or(1);
    let end = int_option(command, "end");
    let page = int_option(command, "page")
        .and_then(|p| usize::try_from(p).ok())
        .unwrap_or(1);

    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    let result = commands::status(&services.context, &interaction, start, end, page).await;
    log_outcome("status", result)
}

pub async fn handle_persona(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let name = required_str(command, "name")?;
    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    let result = commands::set_persona(&services.context, &interaction, name).await;
    if let Ok(persona) = &result {
        info!(%persona, user = command.user.id.get(), "Persona switched");
    }
    log_outcome("persona", result)
}

pub async fn handle_debug_info(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    let result = commands::debug_info(&services.context, &interaction, Utc::now()).await;
    log_outcome("debug_info", result)
}

pub async fn handle_scrape_backup(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let channels = required_str(command, "channels")?;
    let password = required_str(command, "password")?;

    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    // Scans page through whole channels; acknowledge before the response window closes
    if let Err(e) = interaction.defer(true).await {
        warn!("Could not defer backup command: {}", e);
    }
    let transport = DiscordTransport::new(ctx.http.clone(), services.router.clone());
    let result = services
        .scanner
        .scrape(&transport, &transport, &interaction, channels, password)
        .await;
    if let Ok(report) = &result {
        info!(
            scanned = report.scanned,
            archived = report.archived.len(),
            "Backup scan finished"
        );
    }
    log_outcome("scrape_backup", result)
}

pub async fn handle_panic_stop(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let user_id = command.user.id.get();
    if !services.context.config.is_admin(user_id) {
        return reply_ephemeral(ctx, command, "🚫 Not authorized to stop backup scans.").await;
    }

    let text = if services.scanner.panic_stop() {
        warn!(user = user_id, "Backup scan stopped by operator");
        "Stopping the backup scan."
    } else {
        "No backup scan is running."
    };
    reply_ephemeral(ctx, command, text).await
}

pub async fn handle_export(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let json = match commands::export_json(&services.context).await {
        Ok(json) => json,
        Err(e) => {
            warn!("Export failed: {}", e);
            let line = walpurgis_core::Line::from_error(&e);
            return reply_ephemeral(ctx, command, &services.context.say(&line)).await;
        }
    };

    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    interaction
        .respond_with(
            CreateInteractionResponseMessage::new()
                .content("Here's the archive.")
                .add_file(CreateAttachment::bytes(json.into_bytes(), EXPORT_FILE_NAME))
                .ephemeral(true),
        )
        .await
        .map_err(|e| miette::miette!("Failed to send export: {}", e))
}

pub async fn handle_import(
    ctx: &Context,
    command: &CommandInteraction,
    services: &Services,
) -> Result<()> {
    let interaction = SlashInteraction::new(ctx.http.clone(), command.clone());
    if !services.context.config.is_admin(interaction.user_id()) {
        // The core operation refuses with the proper notice before reading anything
        let result = commands::import(&services.context, &interaction, "").await;
        return log_outcome("import_db", result);
    }

    let json = match read_attachment(command, "file").await {
        Ok(json) => json,
        Err(e) => {
            warn!("Import upload unreadable: {}", e);
            return reply_ephemeral(ctx, command, &e.to_string()).await;
        }
    };
    let result = commands::import(&services.context, &interaction, &json).await;
    log_outcome("import_db", result)
}

/// Download an attachment option as UTF-8 text.
async fn read_attachment(
    command: &CommandInteraction,
    name: &str,
) -> std::result::Result<String, DiscordError> {
    let id = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| match &opt.value {
            CommandDataOptionValue::Attachment(id) => Some(*id),
            _ => None,
        })
        .ok_or_else(|| DiscordError::BadOption {
            name: name.to_string(),
        })?;
    let attachment =
        command
            .data
            .resolved
            .attachments
            .get(&id)
            .ok_or_else(|| DiscordError::Attachment {
                reason: "upload was not included in the command".to_string(),
            })?;

    let bytes = attachment
        .download()
        .await
        .map_err(|e| DiscordError::Attachment {
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|_| DiscordError::Attachment {
        reason: "file is not UTF-8 text".to_string(),
    })
}
