//! Pulse Common - Shared configuration, logging, and error types for Sector Pulse.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment overrides)
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    AnalyticsConfig, CacheConfig, Config, JobsConfig, MarketConfig, NetworkConfig,
    ObservabilityConfig, StorageConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
