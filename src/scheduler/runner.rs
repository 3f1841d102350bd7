//! Daily broadcast scheduler runner.
//!
//! The scheduler loop:
//! 1. Compute the next fire time from the [`DailySchedule`]
//! 2. Sleep in short naps until it is reached, so wall-clock jumps
//!    (suspend, NTP corrections) are picked up
//! 3. Broadcast, then go back to step 1
//!
//! A [`SchedulerMessage::TriggerBroadcast`] sends immediately without
//! moving the daily fire time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::broadcaster::{Broadcaster, MessageSender};
use super::DailySchedule;

/// Longest single sleep before the clock is re-checked.
const MAX_NAP: Duration = Duration::from_secs(60);

/// Messages that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerMessage {
    /// Broadcast right away.
    TriggerBroadcast,
    /// Stop the scheduler.
    Shutdown,
}

/// Runs the daily broadcast.
pub struct BroadcastScheduler<S> {
    broadcaster: Arc<Broadcaster<S>>,
    schedule: DailySchedule,
}

impl<S: MessageSender> BroadcastScheduler<S> {
    /// Creates a new scheduler.
    #[must_use]
    pub const fn new(broadcaster: Arc<Broadcaster<S>>, schedule: DailySchedule) -> Self {
        Self {
            broadcaster,
            schedule,
        }
    }

    /// Runs the scheduler loop until shutdown.
    pub async fn run(&self, mut rx: mpsc::Receiver<SchedulerMessage>) {
        let mut next_fire = self.schedule.next_after(Utc::now());
        info!("Broadcast scheduler started, next broadcast at {}", next_fire);

        loop {
            let remaining = (next_fire - Utc::now()).to_std().unwrap_or_default();
            let nap = remaining.min(MAX_NAP);

            tokio::select! {
                () = tokio::time::sleep(nap) => {
                    if Utc::now() >= next_fire {
                        self.broadcast_logged().await;
                        next_fire = self.schedule.next_after(Utc::now());
                        info!("Next broadcast at {}", next_fire);
                    }
                }
                msg = rx.recv() => {
                    match msg {
                        Some(SchedulerMessage::TriggerBroadcast) => {
                            debug!("Received trigger broadcast message");
                            self.broadcast_logged().await;
                        }
                        Some(SchedulerMessage::Shutdown) | None => {
                            info!("Scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn broadcast_logged(&self) {
        if let Err(e) = self.broadcaster.broadcast().await {
            error!("Daily broadcast failed: {}", e);
        }
    }
}

impl<S> std::fmt::Debug for BroadcastScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastScheduler")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{FixedOffset, NaiveTime};

    use super::*;
    use crate::rates::RateStorage;
    use crate::subscribers::SubscriberStore;
    use crate::telegram::{ParseMode, TelegramError};

    #[derive(Default)]
    struct CountingSender(AtomicUsize);

    impl MessageSender for CountingSender {
        async fn send_text(
            &self,
            _chat_id: i64,
            _text: &str,
            _mode: ParseMode,
        ) -> Result<(), TelegramError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trigger_then_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.json");
        std::fs::write(
            &path,
            r#"{"2024-05-01": {"timestamp": "2024-05-01T09:00:00", "rates": {}}}"#,
        )
        .unwrap();

        let subscribers = Arc::new(SubscriberStore::open_in_memory().unwrap());
        subscribers.add(10).await.unwrap();
        subscribers.add(20).await.unwrap();

        let sender = Arc::new(CountingSender::default());
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&sender),
            subscribers,
            Arc::new(RateStorage::at(path, 14)),
        ));
        let schedule = DailySchedule::new(
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            FixedOffset::east_opt(7 * 3600).unwrap(),
        );
        let scheduler = BroadcastScheduler::new(broadcaster, schedule);

        let (tx, rx) = mpsc::channel(4);
        tx.send(SchedulerMessage::TriggerBroadcast).await.unwrap();
        tx.send(SchedulerMessage::Shutdown).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), scheduler.run(rx))
            .await
            .unwrap();
        assert_eq!(sender.0.load(Ordering::SeqCst), 2);
    }
}
