//! Gateway event handling and client startup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serenity::all::{Command, GatewayIntents, GuildId, Interaction, Message, Ready};
use serenity::client::{Context, EventHandler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walpurgis_core::{
    reminder::run_reminders, triggers, ArchiveController, BackupScanner, BotContext, Conversation,
    ReplyRouter,
};

use crate::config::DiscordBotConfig;
use crate::error::Result;
use crate::slash_commands::{create_commands, dispatch};
use crate::transport::{inbound_from_message, DiscordTransport};

/// Shared state behind every event.
#[derive(Clone)]
pub struct Services {
    pub context: BotContext,
    pub controller: Arc<ArchiveController>,
    pub router: Arc<ReplyRouter>,
    pub scanner: Arc<BackupScanner>,
}

impl Services {
    pub fn new(context: BotContext) -> Self {
        Self {
            controller: Arc::new(ArchiveController::new(context.clone())),
            scanner: Arc::new(BackupScanner::new(context.clone())),
            router: Arc::new(ReplyRouter::new()),
            context,
        }
    }

    fn transport(&self, ctx: &Context) -> DiscordTransport {
        DiscordTransport::new(ctx.http.clone(), self.router.clone())
    }
}

pub struct WalpurgisHandler {
    services: Services,
    command_guilds: Vec<u64>,
    shutdown: CancellationToken,
    tasks_started: AtomicBool,
}

impl WalpurgisHandler {
    pub fn new(services: Services, command_guilds: Vec<u64>, shutdown: CancellationToken) -> Self {
        Self {
            services,
            command_guilds,
            shutdown,
            tasks_started: AtomicBool::new(false),
        }
    }

    async fn register_commands(&self, ctx: &Context) {
        if self.command_guilds.is_empty() {
            match Command::set_global_commands(&ctx.http, create_commands()).await {
                Ok(commands) => info!(count = commands.len(), "Registered global slash commands"),
                Err(e) => error!("Failed to register global slash commands: {}", e),
            }
            return;
        }

        for guild in &self.command_guilds {
            match GuildId::new(*guild)
                .set_commands(&ctx.http, create_commands())
                .await
            {
                Ok(commands) => info!(
                    guild,
                    count = commands.len(),
                    "Registered guild slash commands"
                ),
                Err(e) => error!(guild, "Failed to register slash commands: {}", e),
            }
        }
    }

    /// Reconnects fire `ready` again; the scheduled tasks start only once.
    fn start_background_tasks(&self, ctx: &Context) {
        if self.tasks_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let conv: Arc<dyn Conversation> = Arc::new(self.services.transport(ctx));

        tokio::spawn(run_reminders(
            self.services.context.clone(),
            conv.clone(),
            self.shutdown.child_token(),
        ));
        tokio::spawn(triggers::run_walpurgis_announcer(
            self.services.context.clone(),
            conv,
            self.shutdown.child_token(),
        ));
    }
}

#[async_trait]
impl EventHandler for WalpurgisHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
        self.register_commands(&ctx).await;
        self.start_background_tasks(&ctx);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        // Replies to a pending question are consumed here and never start a new archive
        let Some(inbound) = self.services.router.offer(inbound_from_message(&msg)) else {
            debug!(message_id = msg.id.get(), "Message delivered to a waiting conversation");
            return;
        };

        for reply in triggers::fun_responses(&inbound.content) {
            if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
                warn!("Failed to send trigger reply: {}", e);
            }
        }

        if inbound.author_id != self.services.context.config.submitter_id
            || inbound.attachments.is_empty()
        {
            return;
        }

        let transport = self.services.transport(&ctx);
        let controller = self.services.controller.clone();
        tokio::spawn(async move {
            let outcome = controller
                .handle_message(&transport, &inbound, Utc::now())
                .await;
            debug!(message_id = inbound.id, ?outcome, "Archive conversation finished");
        });
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = dispatch(&ctx, &command, &self.services).await {
                error!(command = %command.data.name, "Slash command failed: {:?}", e);
            }
        }
    }
}

/// Connect to the gateway and run until `shutdown` is cancelled.
pub async fn run_bot(
    config: DiscordBotConfig,
    context: BotContext,
    shutdown: CancellationToken,
) -> Result<()> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = WalpurgisHandler::new(
        Services::new(context),
        config.command_guilds.clone(),
        shutdown.clone(),
    );

    let mut client = serenity::Client::builder(&config.bot_token, intents)
        .event_handler(handler)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        info!("Shutting down Discord client");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord client");
    client.start().await?;
    Ok(())
}
