//! Exchange rate history and reporting.
//!
//! The fetcher appends one [`RateRecord`] per day to a JSON file; the bot
//! reads it back and renders the latest day as a Telegram message.

mod model;
mod report;
mod storage;

pub use model::{CurrencyRate, Rate, RateHistory, RateRecord};
pub use report::{
    format_rates_message, RatesSnapshot, ReportedCurrency, Trend, REPORTED_CURRENCIES,
};
pub use storage::{prune, RateStorage, StorageError, DEFAULT_RETENTION_DAYS};

pub(crate) use model::deserialize_lenient_rate;
