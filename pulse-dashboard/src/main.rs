//! Sector Pulse - NSE industry dashboard backend.
//!
//! Serves live movers and industry aggregates over HTTP, snapshots prices
//! and delivery figures into SQLite on a cron schedule.

use anyhow::Result;
use pulse_common::config::Config;
use pulse_common::logging::init_logging_with_exclusions;
use pulse_dashboard::DashboardService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = Config::load_with_env()?;
    config.validate()?;

    // Initialize logging
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Sector Pulse v{}", env!("CARGO_PKG_VERSION"));

    let service = DashboardService::new(config)?;

    // Log startup timing before entering main service loop
    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
