//! Quote cache.
//!
//! In-memory, per-symbol cache with a single TTL measured from each quote's
//! `fetched_at_ms`. Expired entries are ignored on read and dropped on
//! overwrite or by `clear_expired`; there is no background eviction.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use super::{now_ms, Quote};

/// Per-symbol quote cache with TTL and a global bypass switch.
pub struct QuoteCache {
    /// key = normalized symbol
    entries: RwLock<HashMap<String, Quote>>,
    ttl: Duration,
    /// When set, reads always miss
    bypass: bool,
}

impl QuoteCache {
    pub fn new(ttl: Duration, bypass: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            bypass,
        }
    }

    /// Build from `[cache]` config.
    pub fn from_config(config: &pulse_common::CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.disabled)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether reads are bypassed.
    pub fn bypass(&self) -> bool {
        self.bypass
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    fn is_expired(quote: &Quote, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - quote.fetched_at_ms >= ttl_ms
    }

    /// Get a fresh quote. Misses when bypassed, absent, or expired.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.get_at(symbol, now_ms())
    }

    /// Like [`get`](Self::get) with an explicit clock.
    pub fn get_at(&self, symbol: &str, now_ms: i64) -> Option<Quote> {
        if self.bypass {
            return None;
        }

        let entries = self.entries.read().ok()?;
        entries.get(symbol).and_then(|quote| {
            if Self::is_expired(quote, now_ms, self.ttl_ms()) {
                None
            } else {
                Some(quote.clone())
            }
        })
    }

    /// Store a quote, replacing any previous entry for its symbol.
    ///
    /// Writes happen even when bypassed.
    pub fn set(&self, quote: Quote) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(quote.symbol.clone(), quote);
        }
    }

    /// Drop all expired entries
    pub fn clear_expired(&self) {
        let now = now_ms();
        let ttl_ms = self.ttl_ms();
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, quote| !Self::is_expired(quote, now, ttl_ms));
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = now_ms();
        let ttl_ms = self.ttl_ms();
        let (total, expired) = self
            .entries
            .read()
            .ok()
            .map(|entries| {
                let total = entries.len();
                let expired = entries
                    .values()
                    .filter(|q| Self::is_expired(q, now, ttl_ms))
                    .count();
                (total, expired)
            })
            .unwrap_or((0, 0));

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
            bypass: self.bypass,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    pub bypass: bool,
}

// ============================================================================
// Tests
// ============================================================================
