//! Daily broadcast scheduler module.
//!
//! Sends the latest rates to every subscriber once a day at a fixed local
//! time.

mod broadcaster;
mod runner;
mod schedule;

pub use broadcaster::{BroadcastSummary, Broadcaster, MessageSender};
pub use runner::{BroadcastScheduler, SchedulerMessage};
pub use schedule::DailySchedule;
