//! NSE India quote adapter.
//!
//! Uses the public `quote-equity` endpoint. NSE rejects API calls without
//! session cookies, so `prepare` loads the site root once per batch and the
//! client's cookie store carries the session into the quote requests.
//!
//! # Response shape
//!
//! ```json
//! {
//!   "info": { "companyName": "Infosys Limited" },
//!   "priceInfo": { "lastPrice": 1520.4, "pChange": -0.83 }
//! }
//! ```
//!
//! Numeric fields occasionally arrive as strings; both forms are accepted.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{ProviderError, QuoteProvider, RawQuote};

// ============================================================================
// Constants
// ============================================================================

/// Quote endpoint, relative to the base URL
const QUOTE_ENDPOINT: &str = "/api/quote-equity";

/// Retry hint after a 429
const RATE_LIMIT_RETRY_SECS: u64 = 1;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct NseQuoteResponse {
    #[serde(default)]
    info: Option<NseInfo>,
    #[serde(default, rename = "priceInfo")]
    price_info: Option<NsePriceInfo>,
}

#[derive(Debug, Deserialize)]
struct NseInfo {
    #[serde(default, rename = "companyName")]
    company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NsePriceInfo {
    #[serde(default, rename = "pChange")]
    p_change: Option<Value>,
    #[serde(default, rename = "lastPrice")]
    last_price: Option<Value>,
}

/// Read a JSON number or numeric string.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

impl From<NseQuoteResponse> for RawQuote {
    fn from(resp: NseQuoteResponse) -> Self {
        let (percent_change, last_price) = resp
            .price_info
            .map(|p| {
                (
                    p.p_change.as_ref().and_then(as_number),
                    p.last_price.as_ref().and_then(as_number),
                )
            })
            .unwrap_or((None, None));

        RawQuote {
            company_name: resp.info.and_then(|i| i.company_name),
            percent_change,
            last_price,
        }
    }
}

// ============================================================================
// NSE Client
// ============================================================================

/// NSE quote provider.
pub struct NseClient {
    base_url: String,
    client: reqwest::Client,
}

impl NseClient {
    /// Create a client for `base_url` (e.g. `https://www.nseindia.com`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Self::build_client(timeout).unwrap_or_else(|e| {
            warn!(
                error = %e,
                "Failed to build NSE client, falling back to a plain client without session cookies"
            );
            reqwest::Client::new()
        });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Client with browser headers and a cookie store.
    fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .cookie_store(true)
            .build()
    }

    /// Build from `[market]` config.
    pub fn from_config(config: &pulse_common::MarketConfig) -> Self {
        Self::new(
            config.provider_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Network("Connection failed".into())
        } else {
            ProviderError::Network(e.to_string())
        }
    }

    /// Map a non-success status to a provider error.
    fn check_status(status: reqwest::StatusCode, symbol: &str) -> Result<(), ProviderError> {
        use reqwest::StatusCode;

        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::Auth("Session rejected".into()))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            }),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(symbol.to_string())),
            s if s.is_server_error() => Err(ProviderError::Unavailable(format!("HTTP {}", s))),
            s => Err(ProviderError::Internal(format!("HTTP {}", s))),
        }
    }
}

#[async_trait]
impl QuoteProvider for NseClient {
    fn name(&self) -> &'static str {
        "nse"
    }

    async fn prepare(&self) -> Result<(), ProviderError> {
        let url = format!("{}/", self.base_url);
        debug!(url = %url, "Priming NSE session");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/html")
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check_status(response.status(), "")
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, ProviderError> {
        let url = format!("{}{}", self.base_url, QUOTE_ENDPOINT);
        debug!(symbol = symbol, "Fetching quote from NSE");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check_status(response.status(), symbol)?;

        let body: NseQuoteResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))?;

        Ok(body.into())
    }
}

// ============================================================================
// Tests
// ============================================================================
