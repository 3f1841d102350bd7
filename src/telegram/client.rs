//! Telegram Bot API client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{
    ApiResponse, GetUpdatesParams, MenuCommand, Message, ParseMode, SendMessageParams,
    SetMyCommandsParams, Update, User,
};
use super::RateLimiter;
use crate::config::BotConfig;

/// Extra time on top of the long polling timeout before the HTTP request
/// itself is abandoned.
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i32, description: String },

    #[error("Invalid response from Telegram: {0}")]
    InvalidResponse(String),

    #[error("Connection error: {0}")]
    Connection(reqwest::Error),
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs embed the bot token.
        Self::Connection(err.without_url())
    }
}

impl<T> ApiResponse<T> {
    /// Converts the envelope into the result or a typed error.
    pub fn into_result(self) -> Result<T, TelegramError> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| TelegramError::InvalidResponse("missing result".to_owned()));
        }

        let code = self.error_code.unwrap_or_default();
        let description = self.description.unwrap_or_else(|| "unknown error".to_owned());
        let retry_after = self.parameters.and_then(|p| p.retry_after);

        match (code, retry_after) {
            (429, Some(seconds)) => Err(TelegramError::FloodWait(seconds)),
            (403, _) => Err(TelegramError::Forbidden(description)),
            _ => Err(TelegramError::Api { code, description }),
        }
    }
}

/// High-level Telegram Bot API client.
pub struct TelegramBot {
    http: Client,

    /// `{api_url}/bot{token}`; never logged.
    endpoint: String,

    poll_timeout: Duration,

    rate_limiter: RateLimiter,
}

impl TelegramBot {
    /// Creates a client for the configured bot.
    pub fn new(config: &BotConfig, message_interval_ms: u64) -> Result<Self, TelegramError> {
        let http = Client::builder()
            .user_agent(concat!("superrich_rates_bot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.token),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            rate_limiter: RateLimiter::from_millis(message_interval_ms),
        })
    }

    /// Invokes a Bot API method.
    async fn call<P, R>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ApiResponse<R>>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(e) => Err(TelegramError::InvalidResponse(format!(
                "{method} returned HTTP {status}: {e}"
            ))),
        }
    }

    /// Returns the bot's own user, verifying the token.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Registers the command menu shown in Telegram clients.
    pub async fn set_my_commands(&self, commands: &[MenuCommand]) -> Result<(), TelegramError> {
        let accepted: bool = self
            .call("setMyCommands", &SetMyCommandsParams { commands }, None)
            .await?;
        if !accepted {
            return Err(TelegramError::InvalidResponse("setMyCommands returned false".to_owned()));
        }
        info!("Registered {} bot commands", commands.len());
        Ok(())
    }

    /// Long-polls for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdatesParams {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &params, Some(self.poll_timeout + POLL_SLACK))
            .await
    }

    /// Sends a text message, honouring the rate limiter.
    ///
    /// A flood wait is waited out once and the message is retried.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<Message, TelegramError> {
        let params = SendMessageParams {
            chat_id,
            text,
            parse_mode: parse_mode.as_api_str(),
            disable_web_page_preview: true,
        };

        self.rate_limiter.wait_and_acquire().await;
        match self.call("sendMessage", &params, None).await {
            Err(TelegramError::FloodWait(seconds)) => {
                warn!("Flood wait while sending to chat {}: {} seconds", chat_id, seconds);
                self.rate_limiter.handle_flood_wait(seconds).await;
                self.rate_limiter.wait_and_acquire().await;
                debug!("Retrying message to chat {}", chat_id);
                self.call("sendMessage", &params, None).await
            }
            result => result,
        }
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("poll_timeout", &self.poll_timeout)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}
