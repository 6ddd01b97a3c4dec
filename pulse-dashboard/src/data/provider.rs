//! Quote provider abstraction.
//!
//! Defines the `QuoteProvider` trait the batched fetcher calls, plus the
//! raw payload and error types shared by all providers.

use async_trait::async_trait;
use std::fmt;

use super::Quote;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to quote providers.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, reset)
    Network(String),
    /// Session rejected (cookie missing or expired)
    Auth(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Symbol unknown to the provider
    NotFound(String),
    /// Response could not be parsed
    Malformed(String),
    /// Request exceeded its deadline
    Timeout,
    /// Provider is temporarily unavailable
    Unavailable(String),
    /// Internal provider error
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::NotFound(symbol) => write!(f, "Symbol not found: {}", symbol),
            Self::Malformed(msg) => write!(f, "Malformed response: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Auth(_)
                | Self::RateLimited { .. }
                | Self::Timeout
                | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Raw Quote
// ============================================================================

/// Quote fields as reported by a provider, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuote {
    pub company_name: Option<String>,
    pub percent_change: Option<f64>,
    pub last_price: Option<f64>,
}

impl RawQuote {
    /// Validate into a [`Quote`].
    ///
    /// Returns `None` when either numeric field is missing or not finite.
    /// A missing company name falls back to the symbol.
    pub fn into_quote(self, symbol: &str, fetched_at_ms: i64) -> Option<Quote> {
        let percent_change = self.percent_change.filter(|v| v.is_finite())?;
        let last_price = self.last_price.filter(|v| v.is_finite())?;
        let company_name = self
            .company_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.to_string());

        Some(Quote {
            symbol: symbol.to_string(),
            percent_change,
            last_price,
            company_name,
            fetched_at_ms,
        })
    }
}

// ============================================================================
// Quote Provider Trait
// ============================================================================

/// Trait for per-symbol quote sources.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider name (e.g., "nse")
    fn name(&self) -> &'static str;

    /// Batch-level preparation, run once before each batch.
    ///
    /// Failure here fails the whole batch and is retried by the fetcher.
    /// Default is a no-op.
    async fn prepare(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Fetch one symbol's current quote.
    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_quote_valid() {
        let raw = RawQuote {
            company_name: Some(" Infosys Limited ".into()),
            percent_change: Some(-1.25),
            last_price: Some(1500.5),
        };
        let quote = raw.into_quote("INFY", 42).unwrap();
        assert_eq!(quote.symbol, "INFY");
        assert_eq!(quote.company_name, "Infosys Limited");
        assert_eq!(quote.fetched_at_ms, 42);
    }

    #[test]
    fn test_into_quote_rejects_missing_or_nan() {
        let missing = RawQuote {
            percent_change: None,
            last_price: Some(10.0),
            ..Default::default()
        };
        assert!(missing.into_quote("X", 0).is_none());

        let nan = RawQuote {
            percent_change: Some(f64::NAN),
            last_price: Some(10.0),
            ..Default::default()
        };
        assert!(nan.into_quote("X", 0).is_none());
    }

    #[test]
    fn test_into_quote_name_falls_back_to_symbol() {
        let raw = RawQuote {
            company_name: Some("   ".into()),
            percent_change: Some(0.0),
            last_price: Some(1.0),
        };
        assert_eq!(raw.into_quote("ITC", 0).unwrap().company_name, "ITC");
    }

    #[test]
    fn test_error_recoverable() {
        assert!(ProviderError::Network("reset".into()).is_recoverable());
        assert!(ProviderError::Timeout.is_recoverable());
        assert!(!ProviderError::NotFound("XYZ".into()).is_recoverable());
        assert!(!ProviderError::Malformed("bad json".into()).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }
}
