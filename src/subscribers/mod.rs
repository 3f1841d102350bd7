//! Subscriber registry for the daily broadcast.

mod store;

pub use store::{SubscriberError, SubscriberStore};
