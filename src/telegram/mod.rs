//! Telegram Bot API module.
//!
//! Provides a thin typed client over the HTTPS Bot API: long polling for
//! updates, sending messages with rate limiting, and registering the
//! command menu.

mod client;
mod rate_limiter;
mod types;

pub use client::{TelegramBot, TelegramError};
pub use rate_limiter::RateLimiter;
pub use types::{
    ApiResponse, Chat, MenuCommand, Message, ParseMode, ResponseParameters, Update, User,
};
