//! Market data module for NSE equities.
//!
//! Provides the symbol registry, quote cache, provider abstraction, batched
//! fetcher, and industry aggregation.
//!
//! # Pipeline
//!
//! ```text
//! request -> BatchFetcher -(hits)-> QuoteCache
//!                 |
//!                 +-(misses, batched)-> QuoteProvider (NSE)
//!                 |
//!                 v
//!          aggregate_by_industry / summarize_market
//! ```

mod aggregator;
mod cache;
mod fetcher;
mod nse;
mod provider;
mod registry;
mod retry;

pub use aggregator::{
    aggregate_by_industry, summarize_market, IndustryAggregate, MarketSummary, UNMAPPED_INDUSTRY,
};
pub use cache::{CacheStats, QuoteCache};
pub use fetcher::{BatchFetcher, FetchError, FetchOutcome, FetcherConfig};
pub use nse::NseClient;
pub use provider::{ProviderError, QuoteProvider, RawQuote};
pub use registry::{RegistryRow, SymbolRegistry, OTHER_INDUSTRY};
pub use retry::{RetryOutcome, RetryPolicy};

use chrono::Utc;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// Market suffixes stripped during symbol normalization.
const MARKET_SUFFIXES: &[&str] = &[".NSE", ".BSE", ".NS", ".BO"];

/// Normalize a raw ticker: trim, uppercase, drop a market suffix.
///
/// `"reliance.ns"` -> `"RELIANCE"`
pub fn normalize_symbol(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    for suffix in MARKET_SUFFIXES {
        if let Some(stripped) = upper.strip_suffix(suffix) {
            return stripped.trim().to_string();
        }
    }
    upper
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A per-symbol price snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Normalized ticker
    pub symbol: String,
    /// Percent change versus previous close
    pub percent_change: f64,
    /// Last traded price
    pub last_price: f64,
    /// Company display name
    pub company_name: String,
    /// When the snapshot was taken (epoch ms)
    pub fetched_at_ms: i64,
}

/// Lookback window accepted by the industry endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Timeframe {
    /// Parse from the query-string form ("1d", "1w", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Some(Self::OneDay),
            "1w" => Some(Self::OneWeek),
            "1m" => Some(Self::OneMonth),
            "3m" => Some(Self::ThreeMonths),
            "6m" => Some(Self::SixMonths),
            "1y" => Some(Self::OneYear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::OneDay
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
