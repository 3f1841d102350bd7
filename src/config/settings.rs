//! Application settings and Telegram configuration.

use std::fmt;
use std::path::PathBuf;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

use crate::rates::DEFAULT_RETENTION_DAYS;

/// Default Telegram Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Default location of the Superrich site bundle holding the API credential.
pub const DEFAULT_JS_URL: &str = "https://www.superrichthailand.com/app.min.js";

/// Default Superrich rates endpoint.
pub const DEFAULT_RATES_API_URL: &str = "https://www.superrichthailand.com/api/v1/rates";

/// Telegram Bot API configuration.
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token issued by `@BotFather`.
    pub token: String,

    /// Base URL of the Bot API server.
    pub api_url: String,

    /// Long polling timeout for `getUpdates` in seconds.
    pub poll_timeout_secs: u64,
}

impl BotConfig {
    /// Creates a new configuration with default endpoint and polling timeout.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_url: DEFAULT_API_URL.to_owned(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TELEGRAM_BOT_TOKEN` (or `TELEGRAM_TOKEN`) to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .or_else(|_| std::env::var("TELEGRAM_TOKEN"))
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN"))?;

        let token = token.trim().to_owned();
        if token.is_empty() {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN"));
        }

        Ok(Self {
            token,
            api_url: std::env::var("TELEGRAM_API_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or_else(|_| DEFAULT_API_URL.to_owned()),
            poll_timeout_secs: env_parse("TELEGRAM_POLL_TIMEOUT")
                .unwrap_or_else(default_poll_timeout),
        })
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &mask_token(&self.token))
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

const fn default_poll_timeout() -> u64 {
    30
}

/// Bot runtime settings.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Path to the rates history JSON file written by the fetcher.
    pub rates_path: PathBuf,

    /// Path to the SQLite subscriber database.
    pub database_path: PathBuf,

    /// Local time of the daily broadcast.
    pub daily_send_time: NaiveTime,

    /// UTC offset of the broadcast time zone.
    pub timezone: FixedOffset,

    /// Minimum interval between outgoing messages in milliseconds.
    pub broadcast_interval_ms: u64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            rates_path: default_rates_path(),
            database_path: PathBuf::from("users.db"),
            daily_send_time: default_send_time(),
            timezone: default_timezone(),
            broadcast_interval_ms: 50,
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        let defaults = Self::default();
        Self {
            rates_path: std::env::var("RATES_PATH").map_or(defaults.rates_path, PathBuf::from),
            database_path: std::env::var("USERS_DB_PATH")
                .map_or(defaults.database_path, PathBuf::from),
            daily_send_time: std::env::var("DAILY_SEND_TIME")
                .ok()
                .and_then(|s| parse_send_time(&s))
                .unwrap_or(defaults.daily_send_time),
            timezone: timezone_from_env(),
            broadcast_interval_ms: env_parse("BROADCAST_INTERVAL_MS")
                .unwrap_or(defaults.broadcast_interval_ms),
        }
    }

    /// Human-readable broadcast time, e.g. `10:00 (UTC+07:00)`.
    #[must_use]
    pub fn send_time_label(&self) -> String {
        format!("{} (UTC{})", self.daily_send_time.format("%H:%M"), self.timezone)
    }
}

/// Settings for the Superrich rates fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// URL of the site bundle containing the Basic credential.
    pub js_url: String,

    /// URL of the rates API.
    pub api_url: String,

    /// Path to the rates history JSON file.
    pub rates_path: PathBuf,

    /// Number of days of history to keep.
    pub retention_days: u64,

    /// UTC offset used to decide what "today" is.
    pub timezone: FixedOffset,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            js_url: DEFAULT_JS_URL.to_owned(),
            api_url: DEFAULT_RATES_API_URL.to_owned(),
            rates_path: default_rates_path(),
            retention_days: DEFAULT_RETENTION_DAYS,
            timezone: default_timezone(),
        }
    }
}

impl FetcherConfig {
    /// Creates fetcher settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        let defaults = Self::default();
        Self {
            js_url: std::env::var("SUPERRICH_JS_URL").unwrap_or(defaults.js_url),
            api_url: std::env::var("SUPERRICH_API_URL").unwrap_or(defaults.api_url),
            rates_path: std::env::var("RATES_PATH").map_or(defaults.rates_path, PathBuf::from),
            retention_days: env_parse("RATES_RETENTION_DAYS").unwrap_or(defaults.retention_days),
            timezone: timezone_from_env(),
        }
    }
}

fn default_rates_path() -> PathBuf {
    PathBuf::from("exchange_rates.json")
}

fn default_send_time() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Bangkok time (ICT), which has no daylight saving.
fn default_timezone() -> FixedOffset {
    offset_from_hours(7).unwrap_or_else(|| Utc.fix())
}

fn timezone_from_env() -> FixedOffset {
    env_parse::<i32>("TIMEZONE_OFFSET_HOURS")
        .and_then(offset_from_hours)
        .unwrap_or_else(default_timezone)
}

/// Converts a whole-hour UTC offset into a [`FixedOffset`].
#[must_use]
pub fn offset_from_hours(hours: i32) -> Option<FixedOffset> {
    if !(-12..=14).contains(&hours) {
        return None;
    }
    FixedOffset::east_opt(hours * 3600)
}

/// Parses a `HH:MM` wall-clock time.
#[must_use]
pub fn parse_send_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Masks a bot token for logging (keeps the numeric bot id).
fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "***".to_owned(),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = BotSettings::default();
        assert_eq!(settings.rates_path, PathBuf::from("exchange_rates.json"));
        assert_eq!(settings.database_path, PathBuf::from("users.db"));
        assert_eq!(settings.daily_send_time.format("%H:%M").to_string(), "10:00");
        assert_eq!(settings.timezone.local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn test_send_time_label() {
        let settings = BotSettings::default();
        assert_eq!(settings.send_time_label(), "10:00 (UTC+07:00)");
    }

    #[test]
    fn test_bot_config_new() {
        let config = BotConfig::new("123:abc".to_owned());
        assert_eq!(config.api_url, "https://api.telegram.org");
        assert_eq!(config.poll_timeout_secs, 30);
    }

    #[test]
    fn test_debug_masks_token() {
        let config = BotConfig::new("123456:SECRET".to_owned());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("123456:***"));
        assert!(!rendered.contains("SECRET"));
    }

    #[test]
    fn test_parse_send_time() {
        assert_eq!(parse_send_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_send_time(" 23:05 "), NaiveTime::from_hms_opt(23, 5, 0));
        assert_eq!(parse_send_time("25:00"), None);
        assert_eq!(parse_send_time("ten"), None);
    }

    #[test]
    fn test_offset_from_hours() {
        assert_eq!(offset_from_hours(7).map(|o| o.local_minus_utc()), Some(25_200));
        assert_eq!(offset_from_hours(-5).map(|o| o.local_minus_utc()), Some(-18_000));
        assert!(offset_from_hours(15).is_none());
    }

    #[test]
    fn test_fetcher_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.js_url, DEFAULT_JS_URL);
        assert_eq!(config.api_url, DEFAULT_RATES_API_URL);
    }
}
