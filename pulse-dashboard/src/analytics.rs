//! Synthetic delivery statistics and pair analysis.
//!
//! These are demo generators, not statistics: every number is a seeded
//! pseudo-random draw and every response carries `synthetic: true`. The
//! seed combines the configured base seed, the symbol(s) and the date, so
//! the same inputs on the same day always produce the same output.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::data::round2;

/// Days in the rolling delivery average.
const DELIVERY_AVG_WINDOW: i64 = 5;

/// Granger p-values below this are reported as significant.
const GRANGER_SIGNIFICANCE: f64 = 0.05;

/// Synthetic delivery figures for one symbol and day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub symbol: String,
    pub date: NaiveDate,
    pub traded_quantity: u64,
    pub delivery_quantity: u64,
    pub delivery_percent: f64,
    pub avg_delivery_percent_5d: f64,
}

/// Momentum-derived signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Neutral,
    Bearish,
}

impl Signal {
    /// Bullish above 60, bearish below 40.
    pub fn from_momentum(score: f64) -> Self {
        if score > 60.0 {
            Self::Bullish
        } else if score < 40.0 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }
}

/// Synthetic pairwise "AI" analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairAnalysis {
    pub symbol1: String,
    pub symbol2: String,
    pub date: NaiveDate,
    pub correlation: f64,
    pub lag_days: u32,
    pub granger_p_value: f64,
    pub granger_significant: bool,
    pub momentum_score: f64,
    pub signal: Signal,
}

/// Seeded generator for the synthetic endpoints and the delivery job.
#[derive(Debug, Clone)]
pub struct SyntheticAnalytics {
    seed: u64,
}

impl SyntheticAnalytics {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn from_config(config: &pulse_common::AnalyticsConfig) -> Self {
        Self::new(config.seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn rng_for(&self, kind: &str, symbols: &[&str], date: NaiveDate) -> StdRng {
        let key = format!("{}|{}|{}|{}", self.seed, kind, symbols.join(","), date);
        StdRng::seed_from_u64(xxh3_64(key.as_bytes()))
    }

    /// (traded quantity, delivery percent) for one day.
    fn draw_delivery(&self, symbol: &str, date: NaiveDate) -> (u64, f64) {
        let mut rng = self.rng_for("delivery", &[symbol], date);
        let traded: u64 = rng.gen_range(100_000..=10_000_000);
        (traded, round2(rng.gen_range(20.0..=80.0)))
    }

    /// Delivery figures for `symbol` on `date`.
    pub fn delivery_stats(&self, symbol: &str, date: NaiveDate) -> DeliveryStats {
        let (traded_quantity, delivery_percent) = self.draw_delivery(symbol, date);
        let delivery_quantity = (traded_quantity as f64 * delivery_percent / 100.0).round() as u64;

        let window: f64 = (0..DELIVERY_AVG_WINDOW)
            .map(|i| self.draw_delivery(symbol, date - chrono::Duration::days(i)).1)
            .sum();

        DeliveryStats {
            symbol: symbol.to_string(),
            date,
            traded_quantity,
            delivery_quantity,
            delivery_percent,
            avg_delivery_percent_5d: round2(window / DELIVERY_AVG_WINDOW as f64),
        }
    }

    /// Pair analysis for `symbol1` against `symbol2` on `date`.
    pub fn pair_analysis(&self, symbol1: &str, symbol2: &str, date: NaiveDate) -> PairAnalysis {
        let mut rng = self.rng_for("pair", &[symbol1, symbol2], date);

        let correlation = round2(rng.gen_range(-1.0..=1.0));
        let lag_days = rng.gen_range(0..=5);
        let granger_p_value = (rng.gen_range(0.0..=0.1_f64) * 1000.0).round() / 1000.0;
        let momentum_score = (rng.gen_range(0.0..=100.0_f64) * 10.0).round() / 10.0;

        PairAnalysis {
            symbol1: symbol1.to_string(),
            symbol2: symbol2.to_string(),
            date,
            correlation,
            lag_days,
            granger_p_value,
            granger_significant: granger_p_value < GRANGER_SIGNIFICANCE,
            momentum_score,
            signal: Signal::from_momentum(momentum_score),
        }
    }
}

impl Default for SyntheticAnalytics {
    fn default() -> Self {
        Self::new(42)
    }
}

// ============================================================================
// Tests
// ============================================================================
