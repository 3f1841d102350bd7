//! Pacing of outgoing Bot API messages.
//!
//! Telegram allows roughly 30 messages per second across all chats; the
//! broadcast loop goes through this limiter so a large subscriber list
//! does not run into `429 Too Many Requests`.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Enforces a minimum interval between consecutive operations.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,

    /// Earliest instant at which the next operation may run.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Creates a rate limiter from milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Waits until an operation is allowed and reserves the slot.
    ///
    /// Returns the duration waited.
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next = self.next_allowed.lock().await;

        let wait = next
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or_default();

        if !wait.is_zero() {
            debug!("Rate limiter: waiting {:?} before next message", wait);
            tokio::time::sleep(wait).await;
        }

        *next = Some(Instant::now() + self.min_interval);
        wait
    }

    /// Defers all further operations by `retry_after` seconds.
    ///
    /// Called when Telegram answers with a flood wait.
    pub async fn handle_flood_wait(&self, retry_after: u32) {
        warn!("Received flood wait from Telegram: {} seconds", retry_after);
        let mut next = self.next_allowed.lock().await;
        *next = Some(Instant::now() + Duration::from_secs(u64::from(retry_after)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_operation_does_not_wait() {
        let limiter = RateLimiter::from_millis(1000);
        assert_eq!(limiter.wait_and_acquire().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_second_operation_waits_for_interval() {
        let limiter = RateLimiter::from_millis(100);
        limiter.wait_and_acquire().await;

        let waited = limiter.wait_and_acquire().await;
        assert!(waited > Duration::ZERO);
        assert!(waited <= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_flood_wait_defers_next_operation() {
        let limiter = RateLimiter::from_millis(1);
        limiter.handle_flood_wait(1).await;

        let waited = limiter.wait_and_acquire().await;
        assert!(waited > Duration::from_millis(500));
    }
}
