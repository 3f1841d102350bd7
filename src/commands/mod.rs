//! Command handling module.
//!
//! Processes `/start`, `/rates`, `/stop` and `/help` messages sent to the bot.

mod handler;
mod types;

pub use handler::{CommandHandler, NO_RATES_MESSAGE};
pub use types::{BotCommand, CommandReply};
