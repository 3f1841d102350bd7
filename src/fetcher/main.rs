//! Standalone fetcher for Superrich exchange rates.
//!
//! Scrapes the current rates and records them as today's entry in the
//! rates history file read by the bot. Meant to be run from cron, or kept
//! running with `--watch`.

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use superrich_rates_bot::config::FetcherConfig;
use superrich_rates_bot::rates::RateStorage;
use superrich_rates_bot::superrich::{FetchError, SuperrichClient};

/// Longest accepted `--watch` interval: one day.
const MAX_WATCH_MINUTES: u64 = 24 * 60;

/// Superrich exchange rate fetcher.
#[derive(Parser, Debug)]
#[command(name = "fetch_rates")]
#[command(about = "Fetches Superrich Thailand exchange rates into the rates history file")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// File that log lines are appended to.
    #[arg(long, default_value = "fetch_rates.log")]
    log_file: String,

    /// Log to the console only.
    #[arg(long)]
    no_log_file: bool,

    /// Keep running and fetch every N minutes (1 to 1440).
    #[arg(
        short,
        long,
        value_name = "MINUTES",
        value_parser = clap::value_parser!(u64).range(1..=MAX_WATCH_MINUTES)
    )]
    watch: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_file = if args.no_log_file { None } else { Some(args.log_file.as_str()) };
    if let Err(e) = init_logging(&args.log_level, log_file) {
        eprintln!("✗ Failed to open log file {}: {e}", args.log_file);
        return ExitCode::FAILURE;
    }

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let config = FetcherConfig::from_env_with_defaults();

    let client = match SuperrichClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let storage = match RateStorage::open(&config.rates_path, config.retention_days) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to open {}: {}", config.rates_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match args.watch {
        Some(minutes) => {
            watch(&client, &storage, &config, minutes).await;
            ExitCode::SUCCESS
        }
        None => match fetch_once(&client, &storage, &config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        },
    }
}

/// Initializes console logging, plus an append-only log file when given.
fn init_logging(level: &str, log_file: Option<&str>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_target(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(())
}

async fn fetch_once(
    client: &SuperrichClient,
    storage: &RateStorage,
    config: &FetcherConfig,
) -> Result<(), FetchError> {
    info!("Starting exchange rate fetch");

    match client.fetch_and_store(storage, config.timezone).await {
        Ok(count) => {
            info!("Stored rates for {} currencies", count);
            Ok(())
        }
        Err(e) => {
            error!("Failed to fetch exchange rates: {}", e);
            Err(e)
        }
    }
}

/// Fetches on a fixed interval until Ctrl+C. Failures are logged and retried
/// on the next tick.
async fn watch(
    client: &SuperrichClient,
    storage: &RateStorage,
    config: &FetcherConfig,
    minutes: u64,
) {
    info!("Watching rates every {} minute(s). Use Ctrl+C to stop.", minutes);

    let mut interval = tokio::time::interval(Duration::from_secs(minutes.saturating_mul(60)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let _ = fetch_once(client, storage, config).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }
}
