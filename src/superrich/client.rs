//! HTTP client for the Superrich Thailand rates API.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::auth::{decode_basic_auth, extract_basic_auth, Credentials};
use super::FetchError;
use crate::config::FetcherConfig;
use crate::rates::{deserialize_lenient_rate, CurrencyRate, Rate, RateRecord, RateStorage};

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// Top-level body of `GET /api/v1/rates`.
#[derive(Debug, Clone, Deserialize)]
pub struct RatesResponse {
    pub data: RatesData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatesData {
    #[serde(default)]
    pub exchange_rate: Vec<ExchangeRateItem>,
}

/// One currency as published by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRateItem {
    #[serde(rename = "cUnit")]
    pub unit: String,

    #[serde(rename = "countryName", default)]
    pub country_name: String,

    /// Rates per denomination; the first entry is the headline rate.
    #[serde(default)]
    pub rate: Vec<DenominationRate>,
}

/// Rate of one denomination. Unusable values (`null`, `"-"`) are `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct DenominationRate {
    #[serde(rename = "cBuying", default, deserialize_with = "deserialize_lenient_rate")]
    pub buying: Option<Rate>,

    #[serde(rename = "cSelling", default, deserialize_with = "deserialize_lenient_rate")]
    pub selling: Option<Rate>,
}

/// Extracts the headline rate of every currency in the response.
///
/// Currencies without a usable first rate entry are skipped.
#[must_use]
pub fn extract_all_rates(response: &RatesResponse) -> BTreeMap<String, CurrencyRate> {
    let mut rates = BTreeMap::new();

    for item in &response.data.exchange_rate {
        let Some(first) = item.rate.first() else {
            warn!("No rate entries for currency {}, skipping", item.unit);
            continue;
        };
        let (Some(buying), Some(selling)) = (&first.buying, &first.selling) else {
            warn!("Unusable rate for currency {}, skipping", item.unit);
            continue;
        };
        rates.insert(
            item.unit.clone(),
            CurrencyRate::from_rates(item.country_name.clone(), buying.clone(), selling.clone()),
        );
    }

    rates
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Scraper for the Superrich site and rates API.
#[derive(Debug, Clone)]
pub struct SuperrichClient {
    http: Client,
    js_url: String,
    api_url: String,
}

impl SuperrichClient {
    /// Creates a client for the given bundle and API URLs.
    pub fn new(js_url: impl Into<String>, api_url: impl Into<String>) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("superrich_rates_bot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            js_url: js_url.into(),
            api_url: api_url.into(),
        })
    }

    /// Creates a client from fetcher settings.
    pub fn from_config(config: &FetcherConfig) -> Result<Self, FetchError> {
        Self::new(config.js_url.clone(), config.api_url.clone())
    }

    /// Downloads the site bundle.
    pub async fn fetch_js_file(&self) -> Result<String, FetchError> {
        info!("Fetching JavaScript file...");

        let response = self.http.get(&self.js_url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                url: self.js_url.clone(),
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let body = response.text().await?;
        debug!("JavaScript file fetched ({} bytes)", body.len());
        Ok(body)
    }

    /// Discovers the API credentials from the site bundle.
    pub async fn discover_credentials(&self) -> Result<Credentials, FetchError> {
        let js = self.fetch_js_file().await?;
        let encoded = extract_basic_auth(&js)?;
        info!("Basic authorization string extracted successfully");
        decode_basic_auth(&encoded)
    }

    /// Calls the rates API with the given credentials.
    pub async fn fetch_rates(
        &self,
        credentials: &Credentials,
    ) -> Result<RatesResponse, FetchError> {
        info!("Making API request to fetch exchange rates...");

        let response = self
            .http
            .get(&self.api_url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::HttpStatus {
                url: self.api_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed = serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))?;
        info!("API request successful. Exchange rates fetched.");
        Ok(parsed)
    }

    /// Runs the whole scrape: bundle, credentials, API call, extraction.
    pub async fn fetch_all_rates(&self) -> Result<BTreeMap<String, CurrencyRate>, FetchError> {
        let credentials = self.discover_credentials().await?;
        let response = self.fetch_rates(&credentials).await?;
        let rates = extract_all_rates(&response);

        if rates.is_empty() {
            return Err(FetchError::NoRates);
        }

        info!("Extracted rates for {} currencies", rates.len());
        Ok(rates)
    }

    /// Scrapes the current rates and stores them as today's record.
    ///
    /// "Today" is evaluated in `timezone`. Returns the number of currencies
    /// stored.
    pub async fn fetch_and_store(
        &self,
        storage: &RateStorage,
        timezone: FixedOffset,
    ) -> Result<usize, FetchError> {
        let rates = self.fetch_all_rates().await?;
        let count = rates.len();

        let now = Utc::now().with_timezone(&timezone).naive_local();
        storage.upsert(now.date(), RateRecord::new(now, rates))?;

        info!("Results stored successfully in {}", storage.path().display());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CannedServer;

    const SAMPLE: &str = r#"{
        "status": 200,
        "data": {
            "exchangeRate": [
                {
                    "cUnit": "USD",
                    "countryName": "United States",
                    "rate": [
                        {"denom": "100", "cBuying": 36.45, "cSelling": 36.55},
                        {"denom": "1", "cBuying": 35.9, "cSelling": 36.55}
                    ]
                },
                {
                    "cUnit": "RUB",
                    "countryName": "Russia",
                    "rate": [{"cBuying": "0.385", "cSelling": "0.41"}]
                },
                {"cUnit": "KHR", "countryName": "Cambodia", "rate": [{"cBuying": null, "cSelling": "-"}]},
                {"cUnit": "LAK", "countryName": "Laos", "rate": [{"cBuying": "", "cSelling": {}}]},
                {"cUnit": "MMK", "countryName": "Myanmar", "rate": [{"cSelling": 0.015}]},
                {"cUnit": "XXX", "countryName": "Nowhere", "rate": []}
            ]
        }
    }"#;

    #[test]
    fn test_extract_all_rates_uses_first_denomination() {
        let response: RatesResponse = serde_json::from_str(SAMPLE).unwrap();
        let rates = extract_all_rates(&response);

        // KHR, LAK and MMK carry unusable values and are skipped.
        assert_eq!(rates.keys().collect::<Vec<_>>(), ["RUB", "USD"]);
        let usd = &rates["USD"];
        assert_eq!(usd.country_name, "United States");
        assert!((usd.buying_rate.value() - 36.45).abs() < 1e-9);
        assert!((usd.selling_rate.value() - 36.55).abs() < 1e-9);
        assert_eq!(rates["RUB"].buying_rate.to_string(), "0.385");
        assert!(!rates.contains_key("XXX"));
    }

    #[test]
    fn test_missing_exchange_rate_list_is_empty() {
        let response: RatesResponse = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        assert!(extract_all_rates(&response).is_empty());
    }

    #[test]
    fn test_client_builds() {
        let client = SuperrichClient::from_config(&FetcherConfig::default()).unwrap();
        assert_eq!(client.api_url, crate::config::DEFAULT_RATES_API_URL);
    }

    fn client_for(server: &CannedServer) -> SuperrichClient {
        SuperrichClient::new(
            format!("{}/app.min.js", server.url),
            format!("{}/api/v1/rates", server.url),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_failing_bundle_url_is_http_status() {
        let server = CannedServer::start(vec![(500, "oops".to_owned())]).await;

        let result = client_for(&server).fetch_js_file().await;
        assert!(matches!(result, Err(FetchError::HttpStatus { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_rejected_api_call_keeps_body() {
        let server = CannedServer::start(vec![(401, "bad credentials".to_owned())]).await;
        let credentials = Credentials {
            username: "user".to_owned(),
            password: "pass".to_owned(),
        };

        match client_for(&server).fetch_rates(&credentials).await {
            Err(FetchError::HttpStatus { status, body, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_and_store_skips_malformed_currency() {
        let bundle = r#"var h={Authorization:"Basic dXNlcjpwYXNz"};"#.to_owned();
        let server = CannedServer::start(vec![(200, bundle), (200, SAMPLE.to_owned())]).await;

        let dir = tempfile::tempdir().unwrap();
        let storage = RateStorage::open(dir.path().join("rates.json"), 14).unwrap();
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();

        let stored = client_for(&server).fetch_and_store(&storage, offset).await.unwrap();
        assert_eq!(stored, 2);

        let requests = server.requests();
        assert!(requests[0].starts_with("GET /app.min.js "));
        let api_request = requests[1].to_lowercase();
        assert!(api_request.starts_with("get /api/v1/rates "));
        assert!(api_request.contains("authorization: basic dxnlcjpwyxnz"));
        assert!(api_request.contains("content-type: application/json"));

        let history = storage.load();
        assert_eq!(history.len(), 1);
        let record = history.values().next().unwrap();
        assert!(record.get("USD").is_some());
        assert!(record.get("KHR").is_none());
    }
}
