mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing::info;
use walpurgis_core::{config, ArchiveDb, BotContext};

use crate::output::Output;

#[derive(Parser)]
#[command(name = "walpurgis")]
#[command(about = "Daily Johan archive bot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Database file path (overrides config)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and start archiving
    Run,
    /// Write the archive to a JSON file
    Export {
        /// Output file
        #[arg(short = 'o', long, default_value = "daily_johans.json")]
        output: PathBuf,
    },
    /// Load archive entries from a JSON file; existing days are kept
    Import {
        /// JSON export, current or legacy layout
        file: PathBuf,
    },
    /// Show which days are archived
    Status {
        /// First day of the range
        #[arg(long, default_value_t = 1)]
        start: i64,
        /// Last day of the range (default: highest archived day)
        #[arg(long)]
        end: Option<i64>,
    },
}

const LOG_FILE: &str = "walpurgis.log";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    // Initialize tracing with file logging
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Create log directory in user's data directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("walpurgis")
        .join("logs");

    // Ensure log directory exists
    std::fs::create_dir_all(&log_dir).ok();

    // Create a rolling file appender that rotates daily
    let file_appender = rolling::daily(&log_dir, LOG_FILE);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the built-in defaults
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new(
                "walpurgis_core=debug,walpurgis_db=debug,walpurgis_discord=debug,walpurgis_cli=debug,serenity=warn,info",
            )
        } else {
            EnvFilter::new(
                "walpurgis_core=info,walpurgis_db=info,walpurgis_discord=info,walpurgis_cli=info,serenity=warn,warn",
            )
        }
    });

    let terminal_layer = if cli.debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_timer(fmt::time::LocalTime::rfc_3339())
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .compact()
            .boxed()
    };

    // File layer keeps debug output from our crates regardless of the terminal filter
    let file_env_filter = EnvFilter::new(
        "walpurgis_core=debug,walpurgis_db=debug,walpurgis_discord=debug,walpurgis_cli=debug,serenity=info,info",
    );

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_timer(fmt::time::LocalTime::rfc_3339())
        .with_ansi(false) // Disable ANSI colors in file output
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(file_env_filter))
        .init();

    info!(
        "Logging initialized. Logs are being written to: {:?}",
        log_dir.join(LOG_FILE)
    );

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        config::load_config(config_path).await?
    } else {
        info!("Loading config from standard locations");
        config::load_config_from_standard_locations().await?
    };
    let mut config = config.apply_env_overrides()?;
    if let Some(db_path) = cli.db_path {
        config.database_path = db_path;
    }
    config.validate()?;

    let db = ArchiveDb::open(&config.database_path).await?;
    let context = BotContext::new(config, db).await?;
    let output = Output::new();

    match cli.command {
        Commands::Run => commands::run::run(context, &output).await?,
        Commands::Export { output: path } => {
            commands::archive::export(&context, &path, &output).await?;
        }
        Commands::Import { file } => {
            commands::archive::import(&context, &file, &output).await?;
        }
        Commands::Status { start, end } => {
            commands::archive::status(&context, start, end, &output).await?;
        }
    }

    Ok(())
}
