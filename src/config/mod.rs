//! Configuration module for the rates bot and fetcher.
//!
//! Settings come from environment variables (optionally loaded from a
//! `.env` file) with defaults matching the Superrich Thailand deployment.

mod settings;

pub use settings::{
    offset_from_hours, parse_send_time, BotConfig, BotSettings, ConfigError, FetcherConfig,
    DEFAULT_API_URL, DEFAULT_JS_URL, DEFAULT_RATES_API_URL,
};
