//! `walpurgis run`: connect to Discord and archive until interrupted.

use miette::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use walpurgis_core::BotContext;
use walpurgis_discord::{run_bot, DiscordBotConfig};

use crate::output::Output;

pub async fn run(context: BotContext, output: &Output) -> Result<()> {
    let Some(discord) = DiscordBotConfig::from_env() else {
        return Err(miette::miette!(
            help = "Put DISCORD_TOKEN in the environment or a .env file",
            "DISCORD_TOKEN is not set"
        ));
    };
    if context.config.submitter_id == 0 {
        output.warning("submitter_id is not configured; automatic archiving is disabled");
    }

    let state = context.tracker.current();
    output.section("Walpurgis");
    output.kv("Next expected day", &state.expected_next_day.to_string());
    output.kv("Persona", context.dialogue.persona().as_str());
    output.kv("Timezone", &context.config.timezone);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
        signal.cancel();
    });

    run_bot(discord, context.clone(), shutdown).await?;
    context.db.close().await;
    output.success("Stopped");
    Ok(())
}
