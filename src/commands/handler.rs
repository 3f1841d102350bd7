//! Command handler implementation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::{BotCommand, CommandReply};
use crate::rates::{format_rates_message, RateStorage, RatesSnapshot};
use crate::subscribers::SubscriberStore;

/// Reply when the history file has no records yet.
pub const NO_RATES_MESSAGE: &str = "No exchange rates available yet. Please try again later.";

const INTERNAL_ERROR_MESSAGE: &str = "Sorry, something went wrong. Please try again later.";

/// Handles bot commands against the subscriber store and rate history.
#[derive(Debug)]
pub struct CommandHandler {
    subscribers: Arc<SubscriberStore>,

    rates: Arc<RateStorage>,

    /// Broadcast time shown in the welcome message.
    send_time_label: String,

    /// Bot username, used to ignore commands addressed to other bots.
    bot_username: Option<String>,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(
        subscribers: Arc<SubscriberStore>,
        rates: Arc<RateStorage>,
        send_time_label: String,
    ) -> Self {
        Self {
            subscribers,
            rates,
            send_time_label,
            bot_username: None,
        }
    }

    /// Sets the bot username used for `/command@username` filtering.
    #[must_use]
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Tries to parse and execute a command sent from `chat_id`.
    ///
    /// Returns `None` if the message is not a command.
    pub async fn handle(&self, chat_id: i64, message_text: &str) -> Option<CommandReply> {
        let command = BotCommand::parse(message_text, self.bot_username.as_deref())?;

        debug!("Handling command {} from chat {}", command, chat_id);
        let reply = self.execute(command, chat_id).await;
        info!("Command {} from chat {}: success={}", command, chat_id, reply.success);

        Some(reply)
    }

    async fn execute(&self, command: BotCommand, chat_id: i64) -> CommandReply {
        match command {
            BotCommand::Start => self.handle_start(chat_id).await,
            BotCommand::Rates => self.handle_rates(),
            BotCommand::Stop => self.handle_stop(chat_id).await,
            BotCommand::Help => handle_help(),
        }
    }

    async fn handle_start(&self, chat_id: i64) -> CommandReply {
        match self.subscribers.add(chat_id).await {
            Ok(newly_added) => {
                if newly_added {
                    info!("New subscriber: {}", chat_id);
                }
                CommandReply::success(self.welcome_message())
            }
            Err(e) => {
                warn!("Failed to subscribe chat {}: {}", chat_id, e);
                CommandReply::error(INTERNAL_ERROR_MESSAGE)
            }
        }
    }

    fn handle_rates(&self) -> CommandReply {
        let history = self.rates.load();
        match RatesSnapshot::latest(&history) {
            Some(snapshot) => CommandReply::html(format_rates_message(&snapshot)),
            None => CommandReply::error(NO_RATES_MESSAGE),
        }
    }

    async fn handle_stop(&self, chat_id: i64) -> CommandReply {
        match self.subscribers.remove(chat_id).await {
            Ok(true) => CommandReply::success(
                "You have been unsubscribed from daily rates. Send /start to subscribe again.",
            ),
            Ok(false) => CommandReply::success("You are not subscribed. Send /start to subscribe."),
            Err(e) => {
                warn!("Failed to unsubscribe chat {}: {}", chat_id, e);
                CommandReply::error(INTERNAL_ERROR_MESSAGE)
            }
        }
    }

    fn welcome_message(&self) -> String {
        format!(
            "Welcome! You will now receive daily exchange rates for USD, RUB, and EUR at {}.\n\n\
             Use /rates to get the latest exchange rates at any time.",
            self.send_time_label
        )
    }
}

fn handle_help() -> CommandReply {
    let mut lines = vec!["Available commands:".to_owned()];
    for command in BotCommand::ALL {
        lines.push(format!("{command} - {}", command.description()));
    }
    CommandReply::success(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::rates::{CurrencyRate, RateRecord};
    use crate::telegram::ParseMode;

    fn handler(
        dir: &tempfile::TempDir,
    ) -> (CommandHandler, Arc<SubscriberStore>, Arc<RateStorage>) {
        let subscribers = Arc::new(SubscriberStore::open_in_memory().unwrap());
        let rates = Arc::new(RateStorage::open(dir.path().join("rates.json"), 14).unwrap());
        let handler = CommandHandler::new(
            Arc::clone(&subscribers),
            Arc::clone(&rates),
            "10:00 (UTC+07:00)".to_owned(),
        )
        .with_bot_username(Some("RatesBot".to_owned()));
        (handler, subscribers, rates)
    }

    #[tokio::test]
    async fn test_start_subscribes_chat() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, subscribers, _) = handler(&dir);

        let reply = handler.handle(42, "/start").await.unwrap();
        assert!(reply.success);
        assert!(reply.text.starts_with("Welcome!"));
        assert!(reply.text.contains("10:00 (UTC+07:00)"));
        assert_eq!(subscribers.all().await.unwrap(), vec![42]);

        // A second /start keeps a single row.
        handler.handle(42, "/start").await.unwrap();
        assert_eq!(subscribers.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stop_unsubscribes_chat() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, subscribers, _) = handler(&dir);

        handler.handle(42, "/start").await.unwrap();
        let reply = handler.handle(42, "/stop").await.unwrap();
        assert!(reply.text.contains("unsubscribed"));
        assert!(subscribers.all().await.unwrap().is_empty());

        let reply = handler.handle(42, "/stop").await.unwrap();
        assert!(reply.text.contains("not subscribed"));
    }

    #[tokio::test]
    async fn test_rates_without_history() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _, _) = handler(&dir);

        let reply = handler.handle(1, "/rates").await.unwrap();
        assert!(!reply.success);
        assert_eq!(reply.text, NO_RATES_MESSAGE);
    }

    #[tokio::test]
    async fn test_rates_returns_html_report() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _, rates) = handler(&dir);

        let date: chrono::NaiveDate = "2024-05-01".parse().unwrap();
        let mut map = BTreeMap::new();
        map.insert("USD".to_owned(), CurrencyRate::new("United States", 36.5, 36.6));
        rates
            .upsert(date, RateRecord::new(date.and_hms_opt(9, 0, 0).unwrap(), map))
            .unwrap();

        let reply = handler.handle(1, "/rates@ratesbot").await.unwrap();
        assert!(reply.success);
        assert_eq!(reply.parse_mode, ParseMode::Html);
        assert!(reply.text.contains("<b>2024-05-01</b>"));
        assert!(reply.text.contains("Buying: 36.5"));
    }

    #[tokio::test]
    async fn test_non_commands_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _, _) = handler(&dir);

        assert!(handler.handle(1, "hello").await.is_none());
        assert!(handler.handle(1, "/rates@OtherBot").await.is_none());
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _, _) = handler(&dir);

        let reply = handler.handle(1, "/help").await.unwrap();
        assert!(reply.text.contains("/start - Start the bot and subscribe to daily rates"));
        assert!(reply.text.contains("/rates - Get the latest exchange rates"));
    }
}
