//! Delivery of the rates report to every subscriber.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::rates::{format_rates_message, RateStorage, RatesSnapshot};
use crate::subscribers::{SubscriberError, SubscriberStore};
use crate::telegram::{ParseMode, TelegramBot, TelegramError};

/// Something that can deliver a text message to a chat.
pub trait MessageSender: Send + Sync {
    fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;
}

impl MessageSender for TelegramBot {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<(), TelegramError> {
        self.send_message(chat_id, text, parse_mode).await.map(|_| ())
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
    /// Chats dropped because they blocked or removed the bot.
    pub removed: usize,
}

/// Sends the latest rates to all subscribers.
#[derive(Debug)]
pub struct Broadcaster<S> {
    sender: Arc<S>,
    subscribers: Arc<SubscriberStore>,
    rates: Arc<RateStorage>,
}

impl<S: MessageSender> Broadcaster<S> {
    #[must_use]
    pub const fn new(
        sender: Arc<S>,
        subscribers: Arc<SubscriberStore>,
        rates: Arc<RateStorage>,
    ) -> Self {
        Self {
            sender,
            subscribers,
            rates,
        }
    }

    /// Broadcasts the latest report.
    ///
    /// Send failures are counted and logged. Only failing to list the
    /// subscribers aborts the broadcast.
    pub async fn broadcast(&self) -> Result<BroadcastSummary, SubscriberError> {
        let mut summary = BroadcastSummary::default();

        let history = self.rates.load();
        let Some(snapshot) = RatesSnapshot::latest(&history) else {
            warn!("No exchange rates stored, skipping daily broadcast");
            return Ok(summary);
        };
        let message = format_rates_message(&snapshot);

        let chat_ids = self.subscribers.all().await?;
        info!(
            "Broadcasting rates for {} to {} subscribers",
            snapshot.date,
            chat_ids.len()
        );

        for chat_id in chat_ids {
            match self.sender.send_text(chat_id, &message, ParseMode::Html).await {
                Ok(()) => {
                    debug!("Sent rates to chat {}", chat_id);
                    summary.sent += 1;
                }
                Err(TelegramError::Forbidden(reason)) => {
                    info!("Removing chat {} from subscribers: {}", chat_id, reason);
                    match self.subscribers.remove(chat_id).await {
                        Ok(_) => summary.removed += 1,
                        Err(e) => {
                            error!("Failed to remove chat {}: {}", chat_id, e);
                            summary.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to send rates to chat {}: {}", chat_id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Broadcast finished: sent={}, failed={}, removed={}",
            summary.sent, summary.failed, summary.removed
        );
        Ok(summary)
    }
}
