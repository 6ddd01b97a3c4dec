//! Configuration validation for Sector Pulse services.
//!
//! Ensures values are within usable ranges before the service starts.

use cron::Schedule;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    CacheConfig, Config, JobsConfig, MarketConfig, NetworkConfig, ObservabilityConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.network.validate(),
            self.observability.validate(),
            self.market.validate(),
            self.cache.validate(),
            self.jobs.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for NetworkConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "network.port".into(),
            });
        }
        if self.bind.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "network.bind".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of {}", LEVELS.join(", ")),
            });
        }
        if self.log_format != "json" && self.log_format != "pretty" {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: "must be 'json' or 'pretty'".into(),
            });
        }
        Ok(())
    }
}

impl Validate for MarketConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidValue {
                field: "market.batch_size".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_retries == 0 {
            return Err(ValidationError::InvalidValue {
                field: "market.max_retries".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "market.request_timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.provider_base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "market.provider_base_url".into(),
            });
        }
        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.ttl_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "cache.ttl_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Validate for JobsConfig {
    fn validate(&self) -> ValidationResult<()> {
        let crons = [
            ("jobs.price_snapshot_cron", &self.price_snapshot_cron),
            ("jobs.delivery_snapshot_cron", &self.delivery_snapshot_cron),
            ("jobs.cleanup_cron", &self.cleanup_cron),
        ];

        for (field, expr) in crons {
            if let Err(e) = Schedule::from_str(expr) {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: format!("invalid cron expression '{}': {}", expr, e),
                });
            }
        }
        Ok(())
    }
}
