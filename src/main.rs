//! Superrich Rates Bot - Main Entry Point
//!
//! A Telegram bot that answers rate queries and broadcasts the latest
//! Superrich Thailand exchange rates to its subscribers once a day.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use superrich_rates_bot::commands::{BotCommand, CommandHandler};
use superrich_rates_bot::config::{BotConfig, BotSettings};
use superrich_rates_bot::rates::{RateStorage, DEFAULT_RETENTION_DAYS};
use superrich_rates_bot::scheduler::{
    BroadcastScheduler, Broadcaster, DailySchedule, SchedulerMessage,
};
use superrich_rates_bot::subscribers::SubscriberStore;
use superrich_rates_bot::telegram::{TelegramBot, TelegramError, Update};

/// Delay before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram bot for daily Superrich exchange rates.
#[derive(Parser, Debug)]
#[command(name = "rates_bot")]
#[command(about = "Broadcast daily Superrich Thailand exchange rates on Telegram")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Send the latest rates to every subscriber once and exit.
    #[arg(long)]
    broadcast_now: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let bot_config = BotConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;
    let settings = BotSettings::from_env_with_defaults();

    let subscribers = Arc::new(
        SubscriberStore::open(&settings.database_path).with_context(|| {
            format!("Failed to open subscriber database {}", settings.database_path.display())
        })?,
    );
    let rates = Arc::new(RateStorage::at(&settings.rates_path, DEFAULT_RETENTION_DAYS));

    let bot = Arc::new(
        TelegramBot::new(&bot_config, settings.broadcast_interval_ms)
            .context("Failed to create Telegram client")?,
    );

    let me = bot.get_me().await.context("Failed to reach the Bot API (is the token valid?)")?;
    info!(
        "Authorized as @{} (id {})",
        me.username.as_deref().unwrap_or("unknown"),
        me.id
    );

    if let Err(e) = bot.set_my_commands(&BotCommand::menu()).await {
        warn!("Failed to register the command menu: {}", e);
    }

    let broadcaster = Arc::new(Broadcaster::new(
        Arc::clone(&bot),
        Arc::clone(&subscribers),
        Arc::clone(&rates),
    ));

    if args.broadcast_now {
        let summary = broadcaster.broadcast().await.context("Broadcast failed")?;
        info!(
            "Broadcast finished: {} sent, {} failed, {} removed",
            summary.sent, summary.failed, summary.removed
        );
        return Ok(());
    }

    let handler = CommandHandler::new(
        Arc::clone(&subscribers),
        Arc::clone(&rates),
        settings.send_time_label(),
    )
    .with_bot_username(me.username.clone());

    let (scheduler_tx, scheduler_rx) = mpsc::channel::<SchedulerMessage>(8);
    let scheduler = BroadcastScheduler::new(
        broadcaster,
        DailySchedule::new(settings.daily_send_time, settings.timezone),
    );
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_rx).await;
    });

    info!(
        "Bot is running with {} subscriber(s), daily broadcast at {}. Use Ctrl+C to stop.",
        subscribers.count().await.unwrap_or_default(),
        settings.send_time_label()
    );

    tokio::select! {
        () = poll_updates(&bot, &handler) => {}
        () = shutdown_signal() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down...");
    let _ = scheduler_tx.send(SchedulerMessage::Shutdown).await;
    let _ = scheduler_handle.await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Long-polls the Bot API and answers commands until the task is dropped.
async fn poll_updates(bot: &TelegramBot, handler: &CommandHandler) {
    let mut offset: Option<i64> = None;

    loop {
        let updates = match bot.get_updates(offset).await {
            Ok(updates) => updates,
            Err(TelegramError::FloodWait(seconds)) => {
                warn!("Polling rate limited, waiting {}s", seconds);
                tokio::time::sleep(Duration::from_secs(u64::from(seconds))).await;
                continue;
            }
            Err(e) => {
                warn!("Failed to fetch updates: {}", e);
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            handle_update(bot, handler, update).await;
        }
    }
}

async fn handle_update(bot: &TelegramBot, handler: &CommandHandler, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    let Some(text) = message.text.as_deref() else {
        return;
    };

    let chat_id = message.chat.id;
    let Some(reply) = handler.handle(chat_id, text).await else {
        return;
    };

    if let Err(e) = bot.send_message(chat_id, &reply.text, reply.parse_mode).await {
        error!("Failed to reply to chat {}: {}", chat_id, e);
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
