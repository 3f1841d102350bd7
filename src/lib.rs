//! Superrich Rates Bot Library
//!
//! Daily Thai baht exchange rates from Superrich Thailand, delivered over
//! Telegram.
//!
//! This crate provides the core functionality for:
//! - Scraping the Superrich rates API and keeping a daily JSON history
//! - Rendering the latest USD/RUB/EUR rates with day-over-day trends
//! - Storing subscribed chats in SQLite
//! - Answering bot commands and broadcasting the report every day

pub mod commands;
pub mod config;
pub mod rates;
pub mod scheduler;
pub mod subscribers;
pub mod superrich;
pub mod telegram;

#[cfg(test)]
mod test_support;
