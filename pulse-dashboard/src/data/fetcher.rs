//! Batched quote fetcher.
//!
//! Filters requested symbols against the registry, serves fresh cache hits,
//! and fetches the rest in fixed-size batches:
//!
//! - symbols inside a batch are fetched concurrently
//! - a pause separates consecutive batches
//! - the batch-level step (`QuoteProvider::prepare`) is retried with a
//!   fixed backoff; an exhausted batch is abandoned and the run continues
//! - a failing symbol is dropped without affecting its batch

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::provider::{ProviderError, QuoteProvider};
use super::retry::{RetryOutcome, RetryPolicy};
use super::{normalize_symbol, now_ms, Quote, QuoteCache, SymbolRegistry};

/// Fetch failures that abort the whole request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Symbol registry is empty")]
    EmptyRegistry,
}

/// Fetcher tuning.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub inter_batch_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            retry: RetryPolicy::default(),
            inter_batch_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl FetcherConfig {
    /// Build from `[market]` config.
    pub fn from_config(config: &pulse_common::MarketConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_backoff_ms),
            ),
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

/// Result of one fetch run.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Successfully obtained quotes, cache hits first
    pub quotes: Vec<Quote>,
    /// True when at least one fresh cache hit contributed
    pub served_from_cache: bool,
    /// Unique registered symbols requested
    pub requested: usize,
    /// Inputs dropped because they are not in the registry
    pub filtered_out: usize,
    /// Batches abandoned after exhausting retries
    pub abandoned_batches: usize,
}

/// Batched, cache-aware quote fetcher.
pub struct BatchFetcher {
    registry: Arc<SymbolRegistry>,
    cache: Arc<QuoteCache>,
    provider: Arc<dyn QuoteProvider>,
    config: FetcherConfig,
}

impl BatchFetcher {
    pub fn new(
        registry: Arc<SymbolRegistry>,
        cache: Arc<QuoteCache>,
        provider: Arc<dyn QuoteProvider>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Fetch every registered symbol using the configured batch size.
    pub async fn fetch_registry(&self, force_refresh: bool) -> Result<FetchOutcome, FetchError> {
        self.fetch_all(self.registry.symbols(), self.config.batch_size, force_refresh)
            .await
    }

    /// Fetch quotes for `symbols`.
    ///
    /// Inputs are normalized, deduplicated, and restricted to registered
    /// symbols. Unless `force_refresh` is set or the cache is bypassed, fresh
    /// cache hits are returned without a provider call and expired entries
    /// are swept. Fetched quotes are written back to the cache.
    pub async fn fetch_all(
        &self,
        symbols: &[String],
        batch_size: usize,
        force_refresh: bool,
    ) -> Result<FetchOutcome, FetchError> {
        if self.registry.is_empty() {
            return Err(FetchError::EmptyRegistry);
        }

        let (wanted, filtered_out) = self.filter_registered(symbols);
        if filtered_out > 0 {
            debug!(filtered_out, "Dropped unregistered symbols");
        }

        let mut quotes = Vec::with_capacity(wanted.len());
        let mut misses = Vec::new();

        if force_refresh || self.cache.bypass() {
            misses = wanted.clone();
        } else {
            self.cache.clear_expired();
            for symbol in &wanted {
                match self.cache.get(symbol) {
                    Some(quote) => quotes.push(quote),
                    None => misses.push(symbol.clone()),
                }
            }
        }

        let hit_count = quotes.len();
        let served_from_cache = hit_count > 0;
        if served_from_cache {
            debug!(hits = hit_count, misses = misses.len(), "Quotes served from cache");
        }

        let (fetched, abandoned_batches) = self.fetch_batches(&misses, batch_size, true).await;
        quotes.extend(fetched);

        Ok(FetchOutcome {
            quotes,
            served_from_cache,
            requested: wanted.len(),
            filtered_out,
            abandoned_batches,
        })
    }

    /// Fetch straight from the provider, skipping cache reads and writes.
    ///
    /// Used by scheduled snapshots so persisted rows are always live data.
    pub async fn fetch_direct(&self, symbols: &[String]) -> Vec<Quote> {
        let (wanted, _) = self.filter_registered(symbols);
        let (quotes, _) = self
            .fetch_batches(&wanted, self.config.batch_size, false)
            .await;
        quotes
    }

    /// Normalize, dedupe, and keep only registered symbols.
    fn filter_registered(&self, symbols: &[String]) -> (Vec<String>, usize) {
        let mut seen = HashSet::new();
        let mut wanted = Vec::new();
        let mut filtered_out = 0;

        for raw in symbols {
            let symbol = normalize_symbol(raw);
            if !self.registry.contains(&symbol) {
                filtered_out += 1;
                continue;
            }
            if seen.insert(symbol.clone()) {
                wanted.push(symbol);
            }
        }

        (wanted, filtered_out)
    }

    /// Returns fetched quotes and the number of abandoned batches.
    async fn fetch_batches(
        &self,
        symbols: &[String],
        batch_size: usize,
        write_cache: bool,
    ) -> (Vec<Quote>, usize) {
        if symbols.is_empty() {
            return (Vec::new(), 0);
        }

        let batches: Vec<&[String]> = symbols.chunks(batch_size.max(1)).collect();
        let total = batches.len();
        let mut quotes = Vec::with_capacity(symbols.len());
        let mut abandoned = 0;

        info!(
            provider = self.provider.name(),
            symbols = symbols.len(),
            batches = total,
            "Fetching quotes"
        );

        for (idx, batch) in batches.into_iter().enumerate() {
            let label = format!("batch {}/{}", idx + 1, total);
            let outcome = self
                .config
                .retry
                .run(&label, |_| self.fetch_batch(batch))
                .await;
            let attempts = outcome.attempts();

            match outcome {
                RetryOutcome::Succeeded { value, .. } => {
                    debug!(
                        batch = idx + 1,
                        attempts,
                        fetched = value.len(),
                        size = batch.len(),
                        "Batch complete"
                    );
                    if write_cache {
                        for quote in &value {
                            self.cache.set(quote.clone());
                        }
                    }
                    quotes.extend(value);
                }
                RetryOutcome::Exhausted { last_error, .. } => {
                    warn!(
                        batch = idx + 1,
                        attempts,
                        size = batch.len(),
                        recoverable = last_error.is_recoverable(),
                        error = %last_error,
                        "Batch abandoned after retries"
                    );
                    abandoned += 1;
                }
            }

            if idx + 1 < total && !self.config.inter_batch_delay.is_zero() {
                sleep(self.config.inter_batch_delay).await;
            }
        }

        info!(
            fetched = quotes.len(),
            requested = symbols.len(),
            abandoned_batches = abandoned,
            "Quote fetch finished"
        );

        (quotes, abandoned)
    }

    /// One batch attempt: prepare, then fetch every symbol concurrently.
    async fn fetch_batch(&self, batch: &[String]) -> Result<Vec<Quote>, ProviderError> {
        self.provider.prepare().await?;

        let results = join_all(batch.iter().map(|symbol| self.fetch_one(symbol))).await;
        Ok(results.into_iter().flatten().collect())
    }

    /// Fetch one symbol. Any failure drops the symbol.
    async fn fetch_one(&self, symbol: &str) -> Option<Quote> {
        match timeout(self.config.request_timeout, self.provider.fetch_quote(symbol)).await {
            Ok(Ok(raw)) => {
                let quote = raw.into_quote(symbol, now_ms());
                if quote.is_none() {
                    debug!(symbol, "Dropping quote with missing price fields");
                }
                quote
            }
            Ok(Err(e)) => {
                debug!(symbol, error = %e, "Quote fetch failed");
                None
            }
            Err(_) => {
                debug!(symbol, "Quote fetch timed out");
                None
            }
        }
    }
}
