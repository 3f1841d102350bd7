//! Command types and definitions.

use std::fmt;

use crate::telegram::{MenuCommand, ParseMode};

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Subscribe to the daily broadcast.
    Start,

    /// Show the latest exchange rates.
    Rates,

    /// Unsubscribe from the daily broadcast.
    Stop,

    /// Show help information.
    Help,
}

impl BotCommand {
    /// All commands in menu order.
    pub const ALL: [Self; 4] = [Self::Start, Self::Rates, Self::Stop, Self::Help];

    /// Parses a command from a message text.
    ///
    /// Accepts `/name` and `/name@bot_username` (case-insensitive), ignoring
    /// any trailing arguments. A command addressed to a different bot
    /// returns `None`.
    #[must_use]
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let command = token.strip_prefix('/')?;

        let (name, mention) = match command.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (command, None),
        };

        if let (Some(mention), Some(username)) = (mention, bot_username)
            && !mention.eq_ignore_ascii_case(username)
        {
            return None;
        }

        match name.to_lowercase().as_str() {
            "start" | "subscribe" => Some(Self::Start),
            "rates" | "rate" => Some(Self::Rates),
            "stop" | "unsubscribe" => Some(Self::Stop),
            "help" => Some(Self::Help),
            _ => None,
        }
    }

    /// Returns the command name as registered with Telegram.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Rates => "rates",
            Self::Stop => "stop",
            Self::Help => "help",
        }
    }

    /// Returns the command description for the menu and help.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Start => "Start the bot and subscribe to daily rates",
            Self::Rates => "Get the latest exchange rates",
            Self::Stop => "Unsubscribe from daily rates",
            Self::Help => "Show available commands",
        }
    }

    /// The command menu registered at startup.
    #[must_use]
    pub fn menu() -> Vec<MenuCommand> {
        Self::ALL
            .iter()
            .map(|cmd| MenuCommand::new(cmd.name(), cmd.description()))
            .collect()
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// Reply produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Whether the command was successful.
    pub success: bool,

    /// Message to send back to the chat.
    pub text: String,

    pub parse_mode: ParseMode,
}

impl CommandReply {
    /// Creates a successful plain-text reply.
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            parse_mode: ParseMode::Plain,
        }
    }

    /// Creates a successful HTML reply.
    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            parse_mode: ParseMode::Html,
            ..Self::success(text)
        }
    }

    /// Creates an error reply.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(text)
        }
    }
}
