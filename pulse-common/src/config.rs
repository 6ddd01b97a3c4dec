//! Configuration management for Sector Pulse services.
//!
//! Services share a configuration file at `~/.sector-pulse/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (PULSE_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PULSE_PORT` → network.port
//! - `PULSE_BIND_ADDRESS` → network.bind
//! - `PULSE_LOG_LEVEL` → observability.log_level
//! - `PULSE_REGISTRY_PATH` → market.registry_path
//! - `PULSE_NSE_BASE_URL` → market.provider_base_url
//! - `PULSE_DB_PATH` → storage.db_path
//! - `PULSE_DISABLE_CACHE` → cache.disabled (`1`, `true`, `yes`, `on`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".sector-pulse"),
        |dirs| dirs.home_dir().join(".sector-pulse"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Interpret an environment flag value as a boolean.
pub fn parse_bool_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ============================================================================
// Network Configuration
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Default: "127.0.0.1" (local only)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

impl NetworkConfig {
    /// `host:port` string for binding the listener.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    5000
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Market Data
// ============================================================================

/// Market-data provider and batching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Base URL of the NSE quote API
    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    /// CSV file mapping symbols to industries
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Symbols fetched concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Attempts per batch before it is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between batch attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Delay between consecutive batches
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Per-request timeout for provider calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            provider_base_url: default_provider_base_url(),
            registry_path: default_registry_path(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://www.nseindia.com".into()
}

fn default_registry_path() -> String {
    "data/industry_symbols.csv".into()
}

fn default_batch_size() -> usize {
    50
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_inter_batch_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    10
}

// ============================================================================
// Cache
// ============================================================================

/// Quote cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Treat every lookup as a miss (process-wide bypass)
    #[serde(default)]
    pub disabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            disabled: false,
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

// ============================================================================
// Storage
// ============================================================================

/// SQLite storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Rows older than this are removed by the cleanup job
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_db_path() -> String {
    config_dir().join("market.db").to_string_lossy().into_owned()
}

fn default_retention_days() -> u32 {
    365
}

// ============================================================================
// Jobs
// ============================================================================

/// Cron schedule configuration for the ingestion jobs.
///
/// Expressions use the six-field `sec min hour day month weekday` syntax
/// and are evaluated in local time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Run the scheduler loop
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Daily price snapshot (default: 15:45 on weekdays, after market close)
    #[serde(default = "default_price_snapshot_cron")]
    pub price_snapshot_cron: String,

    /// Daily delivery snapshot (default: 18:00 on weekdays)
    #[serde(default = "default_delivery_snapshot_cron")]
    pub delivery_snapshot_cron: String,

    /// Weekly cleanup of old rows (default: 02:00 on Sunday)
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            price_snapshot_cron: default_price_snapshot_cron(),
            delivery_snapshot_cron: default_delivery_snapshot_cron(),
            cleanup_cron: default_cleanup_cron(),
        }
    }
}

fn default_price_snapshot_cron() -> String {
    "0 45 15 * * MON-FRI".into()
}

fn default_delivery_snapshot_cron() -> String {
    "0 0 18 * * MON-FRI".into()
}

fn default_cleanup_cron() -> String {
    "0 0 2 * * SUN".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Analytics
// ============================================================================

/// Synthetic analytics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Base seed mixed into every synthetic generator
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

// ============================================================================
// Root Config
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub market: MarketConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PULSE_PORT") {
            if let Ok(p) = port.parse() {
                self.network.port = p;
            }
        }
        if let Some(bind) = lookup("PULSE_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(level) = lookup("PULSE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(path) = lookup("PULSE_REGISTRY_PATH") {
            self.market.registry_path = path;
        }
        if let Some(url) = lookup("PULSE_NSE_BASE_URL") {
            self.market.provider_base_url = url;
        }
        if let Some(path) = lookup("PULSE_DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(flag) = lookup("PULSE_DISABLE_CACHE") {
            self.cache.disabled = parse_bool_flag(&flag);
        }
    }
}
