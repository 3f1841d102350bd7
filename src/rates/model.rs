//! Exchange rate data types shared by the fetcher and the bot.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// A single published rate.
///
/// Rates published as text keep that text, so `"36.620"` is shown and
/// stored as `36.620` rather than re-rendered from the float.
#[derive(Debug, Clone, PartialEq)]
pub struct Rate {
    value: f64,
    text: Option<String>,
}

impl Rate {
    /// A rate published as a JSON number.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self { value, text: None }
    }

    /// Parses a rate published as text. Thousands separators are ignored.
    ///
    /// Returns `None` for placeholders such as `""` or `"-"`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned = text.trim().replace(',', "");
        let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(Self {
            value,
            text: Some(cleaned),
        })
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => f.write_str(text),
            None if self.value.fract() == 0.0 => write!(f, "{:.1}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.text {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_f64(self.value),
        }
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawRate::deserialize(deserializer)? {
            RawRate::Number(value) => Ok(Self::new(value)),
            RawRate::Text(text) => Self::parse(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid rate value: {text:?}"))),
            RawRate::Other(_) => Err(serde::de::Error::custom(
                "rate must be a number or a numeric string",
            )),
        }
    }
}

/// Any JSON value a rate field might hold.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRate {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

/// Reads a rate field that may hold `null`, a placeholder, or garbage.
///
/// Anything that is not a usable rate becomes `None` instead of an error.
pub(crate) fn deserialize_lenient_rate<'de, D>(deserializer: D) -> Result<Option<Rate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawRate::deserialize(deserializer)? {
        RawRate::Number(value) => Some(Rate::new(value)),
        RawRate::Text(text) => Rate::parse(&text),
        RawRate::Other(_) => None,
    })
}

/// Buying and selling rate of one currency against THB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRate {
    /// Country or region name as published by Superrich.
    pub country_name: String,

    /// Rate at which the exchange buys the currency.
    pub buying_rate: Rate,

    /// Rate at which the exchange sells the currency.
    pub selling_rate: Rate,
}

impl CurrencyRate {
    /// Creates a new currency rate from numeric values.
    #[must_use]
    pub fn new(country_name: impl Into<String>, buying_rate: f64, selling_rate: f64) -> Self {
        Self::from_rates(country_name, Rate::new(buying_rate), Rate::new(selling_rate))
    }

    #[must_use]
    pub fn from_rates(
        country_name: impl Into<String>,
        buying_rate: Rate,
        selling_rate: Rate,
    ) -> Self {
        Self {
            country_name: country_name.into(),
            buying_rate,
            selling_rate,
        }
    }
}

/// Rates captured by a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    /// Local time of the fetch.
    pub timestamp: NaiveDateTime,

    /// Rates keyed by currency code (`USD`, `EUR`, ...).
    #[serde(deserialize_with = "deserialize_stored_rates")]
    pub rates: BTreeMap<String, CurrencyRate>,
}

impl RateRecord {
    /// Creates a record for the given fetch time.
    #[must_use]
    pub const fn new(timestamp: NaiveDateTime, rates: BTreeMap<String, CurrencyRate>) -> Self {
        Self { timestamp, rates }
    }

    /// Looks up the rate of a currency.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&CurrencyRate> {
        self.rates.get(code)
    }
}

/// Stored history: one record per calendar day, oldest first.
pub type RateHistory = BTreeMap<NaiveDate, RateRecord>;

/// Reads the rates of a stored record, dropping currencies that do not
/// parse so one bad entry does not invalidate the whole day.
fn deserialize_stored_rates<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, CurrencyRate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;

    Ok(raw
        .into_iter()
        .filter_map(|(code, value)| match serde_json::from_value(value) {
            Ok(rate) => Some((code, rate)),
            Err(e) => {
                warn!("Ignoring stored rate for {}: {}", code, e);
                None
            }
        })
        .collect())
}
