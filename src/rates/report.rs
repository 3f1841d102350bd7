//! Latest-rates report sent to Telegram users.

use std::fmt::Write as _;

use chrono::NaiveDate;

use super::model::{CurrencyRate, RateHistory};

/// Currencies included in the report: code, flag, display name.
pub const REPORTED_CURRENCIES: [(&str, &str, &str); 3] = [
    ("USD", "🇺🇸", "United States"),
    ("RUB", "🇷🇺", "Russia"),
    ("EUR", "🇪🇺", "European Union"),
];

/// Direction of the buying rate compared with the previous stored day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    /// Unchanged, or nothing to compare against.
    Flat,
}

impl Trend {
    /// Compares two buying rates.
    #[must_use]
    pub fn between(current: f64, previous: Option<f64>) -> Self {
        match previous {
            Some(prev) if current > prev => Self::Up,
            Some(prev) if current < prev => Self::Down,
            _ => Self::Flat,
        }
    }

    /// Marker shown next to the buying rate.
    ///
    /// Telegram's HTML subset has no colour styling, so the colour lives in
    /// the emoji.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Up => "🟢↑",
            Self::Down => "🔴↓",
            Self::Flat => "",
        }
    }
}

/// One currency line of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedCurrency {
    pub code: &'static str,
    pub flag: &'static str,
    pub name: &'static str,
    /// `None` when the latest record lacks this currency.
    pub rate: Option<CurrencyRate>,
    pub trend: Trend,
}

/// Rates of the newest stored day with trends against the day before.
#[derive(Debug, Clone, PartialEq)]
pub struct RatesSnapshot {
    pub date: NaiveDate,
    pub currencies: Vec<ReportedCurrency>,
}

impl RatesSnapshot {
    /// Builds the snapshot from the newest entry of `history`.
    ///
    /// Returns `None` if the history is empty.
    #[must_use]
    pub fn latest(history: &RateHistory) -> Option<Self> {
        let mut newest_first = history.iter().rev();
        let (date, latest) = newest_first.next()?;
        let previous = newest_first.next().map(|(_, record)| record);

        let currencies = REPORTED_CURRENCIES
            .iter()
            .map(|&(code, flag, name)| {
                let rate = latest.get(code).cloned();
                let previous_buying = previous
                    .and_then(|record| record.get(code))
                    .map(|r| r.buying_rate.value());
                let trend = rate.as_ref().map_or(Trend::Flat, |r| {
                    Trend::between(r.buying_rate.value(), previous_buying)
                });

                ReportedCurrency {
                    code,
                    flag,
                    name,
                    rate,
                    trend,
                }
            })
            .collect();

        Some(Self {
            date: *date,
            currencies,
        })
    }
}

/// Formats the snapshot as a Telegram HTML message.
#[must_use]
pub fn format_rates_message(snapshot: &RatesSnapshot) -> String {
    let mut message = format!("📅 Latest rates as of <b>{}</b>:\n", snapshot.date);

    for currency in &snapshot.currencies {
        let (buying, selling) = currency.rate.as_ref().map_or_else(
            || ("N/A".to_owned(), "N/A".to_owned()),
            |r| (r.buying_rate.to_string(), r.selling_rate.to_string()),
        );

        let trend = match currency.trend.marker() {
            "" => String::new(),
            marker => format!(" {marker}"),
        };

        let _ = write!(
            message,
            "\n{} <b>{} ({})</b>\n  Buying: {buying}{trend}\n  Selling: {selling}\n",
            currency.flag, currency.code, currency.name
        );
    }

    message
}
