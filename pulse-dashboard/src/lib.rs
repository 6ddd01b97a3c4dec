//! Sector Pulse Dashboard
//!
//! Backend for an NSE market dashboard: live quotes for a registry of
//! symbols grouped by industry, ranked industry aggregates, market-wide
//! movers, SQLite history fed by scheduled snapshot jobs, and seeded
//! synthetic delivery/pair analytics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   pulse-dashboard (Rust Service)                     │
//! │                              :5000                                   │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │ Symbol Registry │  │ Batch Fetcher   │  │ Industry        │     │
//! │  │ + Quote Cache   │  │ (retry, delay)  │  │ Aggregator      │     │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘     │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │ SQLite Storage  │  │ Job Scheduler   │  │ Synthetic       │     │
//! │  │                 │  │ (cron)          │  │ Analytics       │     │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analytics;
pub mod data;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod storage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use pulse_common::config::Config;

use crate::analytics::SyntheticAnalytics;
use crate::data::{BatchFetcher, FetcherConfig, NseClient, QuoteCache, QuoteProvider, SymbolRegistry};
use crate::jobs::{JobRunner, JobScheduler};
use crate::storage::Storage;

/// Dashboard service state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Symbol → industry registry
    pub registry: Arc<SymbolRegistry>,
    /// Shared quote cache
    pub cache: Arc<QuoteCache>,
    /// Batched quote fetcher
    pub fetcher: Arc<BatchFetcher>,
    /// Synthetic analytics generator
    pub analytics: Arc<SyntheticAnalytics>,
    /// SQLite persistence
    pub storage: Arc<Storage>,
    /// Job runner shared by the scheduler and manual triggers
    pub jobs: Arc<JobRunner>,
    /// Cron scheduler
    pub scheduler: Arc<JobScheduler>,
}

impl AppState {
    /// Create state backed by the NSE provider and the configured database.
    pub fn new(config: Config) -> Result<Self> {
        let registry = Arc::new(SymbolRegistry::load(&config.market.registry_path));
        let nse = NseClient::from_config(&config.market);
        let storage = Arc::new(Storage::from_config(&config.storage)?);
        tracing::info!(
            base_url = nse.base_url(),
            db = ?storage.db_path(),
            "Using NSE provider and SQLite storage"
        );

        let provider: Arc<dyn QuoteProvider> = Arc::new(nse);
        Self::with_parts(config, registry, provider, storage)
    }

    /// Create state from explicit parts.
    pub fn with_parts(
        config: Config,
        registry: Arc<SymbolRegistry>,
        provider: Arc<dyn QuoteProvider>,
        storage: Arc<Storage>,
    ) -> Result<Self> {
        let cache = Arc::new(QuoteCache::from_config(&config.cache));
        let fetcher = Arc::new(BatchFetcher::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            provider,
            FetcherConfig::from_config(&config.market),
        ));
        let analytics = Arc::new(SyntheticAnalytics::from_config(&config.analytics));

        let jobs = Arc::new(JobRunner::new(
            Arc::clone(&registry),
            Arc::clone(&fetcher),
            Arc::clone(&analytics),
            Arc::clone(&storage),
            config.storage.retention_days,
        ));
        let scheduler = Arc::new(JobScheduler::new(&config.jobs, Arc::clone(&jobs))?);

        tracing::info!(
            symbols = registry.len(),
            industries = registry.industry_count(),
            fallback = registry.is_fallback(),
            provider = fetcher.provider_name(),
            cache_bypass = cache.bypass(),
            cache_ttl_secs = cache.ttl().as_secs(),
            seed = analytics.seed(),
            "Dashboard state initialized"
        );

        Ok(Self {
            config,
            registry,
            cache,
            fetcher,
            analytics,
            storage,
            jobs,
            scheduler,
        })
    }
}

/// Main dashboard service
pub struct DashboardService {
    state: Arc<AppState>,
}

impl DashboardService {
    /// Create a new dashboard service
    pub fn new(config: Config) -> Result<Self> {
        let state = Arc::new(AppState::new(config)?);
        Ok(Self { state })
    }

    /// Start the scheduler and serve HTTP until ctrl-c.
    pub async fn start(self) -> Result<()> {
        let app = routes::build_router(self.state.clone());

        // Start the job scheduler
        let scheduler = self.state.scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = scheduler.run().await {
                tracing::error!(error = %e, "Job scheduler failed");
            }
        });

        for (job, next) in self.state.scheduler.get_next_schedules() {
            tracing::info!(job = job.name(), next = %next, "Next scheduled run");
        }

        // Start HTTP server
        let addr: SocketAddr = self.state.config.network.socket_addr().parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.state.scheduler.stop().await;
        tracing::info!("Dashboard service stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
