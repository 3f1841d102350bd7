//! Superrich Thailand rates scraper.
//!
//! The public rates API is protected by an HTTP Basic credential that the
//! site ships inside its JavaScript bundle. The scraper downloads the
//! bundle, recovers the credential, and queries the API with it.

mod auth;
mod client;

use thiserror::Error;

pub use auth::{decode_basic_auth, extract_basic_auth, Credentials};
pub use client::{
    extract_all_rates, DenominationRate, ExchangeRateItem, RatesData, RatesResponse,
    SuperrichClient,
};

use crate::rates::StorageError;

/// Errors that can occur while scraping rates.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed with status {status}{}", body_suffix(.body))]
    HttpStatus { url: String, status: u16, body: String },

    #[error("Failed to extract Basic authorization string from the JavaScript file")]
    AuthNotFound,

    #[error("Invalid Basic authorization string: {0}")]
    InvalidAuth(String),

    #[error("Invalid credential pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to parse rates response: {0}")]
    Parse(String),

    #[error("Rates response contained no currencies")]
    NoRates,

    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}
