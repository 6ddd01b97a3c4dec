//! Ingestion and maintenance jobs.
//!
//! [`JobRunner::run`] is the single entry point for both cron-triggered and
//! manually triggered runs. Every run is recorded in `job_logs`.

mod scheduler;

pub use scheduler::{JobScheduler, JobStatus};

use anyhow::{bail, Result};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{error, info};

use crate::analytics::SyntheticAnalytics;
use crate::data::{BatchFetcher, SymbolRegistry};
use crate::storage::{DeliveryRecord, JobRunStatus, PriceRecord, Storage};
use pulse_common::Error;

/// Job type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Persist today's quotes for every registry symbol
    PriceSnapshot,
    /// Persist today's synthetic delivery figures
    DeliverySnapshot,
    /// Purge rows past the retention window
    Cleanup,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [Self::PriceSnapshot, Self::DeliverySnapshot, Self::Cleanup];

    /// Get job name for logging and routing
    pub fn name(&self) -> &'static str {
        match self {
            Self::PriceSnapshot => "price_snapshot",
            Self::DeliverySnapshot => "delivery_snapshot",
            Self::Cleanup => "cleanup",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one job run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: JobKind,
    pub status: JobRunStatus,
    pub records: usize,
    pub log_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub message: String,
}

/// Removes a job from the running set when dropped.
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<JobKind>>,
    kind: JobKind,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.kind);
        }
    }
}

/// Executes jobs against the shared services.
pub struct JobRunner {
    registry: Arc<SymbolRegistry>,
    fetcher: Arc<BatchFetcher>,
    analytics: Arc<SyntheticAnalytics>,
    storage: Arc<Storage>,
    retention_days: u32,
    running: Mutex<HashSet<JobKind>>,
    last_runs: RwLock<HashMap<JobKind, DateTime<Utc>>>,
}

impl JobRunner {
    pub fn new(
        registry: Arc<SymbolRegistry>,
        fetcher: Arc<BatchFetcher>,
        analytics: Arc<SyntheticAnalytics>,
        storage: Arc<Storage>,
        retention_days: u32,
    ) -> Self {
        Self {
            registry,
            fetcher,
            analytics,
            storage,
            retention_days,
            running: Mutex::new(HashSet::new()),
            last_runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.running
            .lock()
            .map(|running| running.contains(&kind))
            .unwrap_or(false)
    }

    /// Start time of the latest run, from memory or the job log.
    pub async fn last_run(&self, kind: JobKind) -> Option<DateTime<Utc>> {
        let cached = self
            .last_runs
            .read()
            .ok()
            .and_then(|runs| runs.get(&kind).copied());

        match cached {
            Some(at) => Some(at),
            None => self.storage.last_job_run(kind.name()).await.ok().flatten(),
        }
    }

    fn acquire(&self, kind: JobKind) -> pulse_common::Result<RunningGuard<'_>> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| Error::Internal("job state lock poisoned".into()))?;

        if !running.insert(kind) {
            return Err(Error::Conflict(format!("Job {} is already running", kind)));
        }

        Ok(RunningGuard {
            running: &self.running,
            kind,
        })
    }

    /// Run a job to completion and record it in the job log.
    ///
    /// Fails with `Conflict` if the same job is already running. A job that
    /// runs but fails returns a report with `Failed` status.
    pub async fn run(&self, kind: JobKind) -> pulse_common::Result<JobReport> {
        let _guard = self.acquire(kind)?;

        let started_at = Utc::now();
        if let Ok(mut runs) = self.last_runs.write() {
            runs.insert(kind, started_at);
        }

        let log_id = self
            .storage
            .start_job(kind.name())
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        info!(job = kind.name(), log_id, "Job started");

        let result = self.execute(kind).await;

        let (status, records, message) = match &result {
            Ok(records) => (
                JobRunStatus::Success,
                *records,
                format!("Processed {} records", records),
            ),
            Err(e) => (JobRunStatus::Failed, 0, e.to_string()),
        };

        if let Err(e) = self
            .storage
            .finish_job(log_id, status, records, Some(&message))
            .await
        {
            error!(job = kind.name(), log_id, error = %e, "Failed to close job log");
        }

        let finished_at = Utc::now();
        let elapsed_ms = (finished_at - started_at).num_milliseconds();

        match status {
            JobRunStatus::Failed => {
                error!(job = kind.name(), elapsed_ms, error = %message, "Job failed")
            }
            _ => info!(job = kind.name(), records, elapsed_ms, "Job finished"),
        }

        Ok(JobReport {
            job: kind,
            status,
            records,
            log_id,
            started_at,
            finished_at,
            message,
        })
    }

    async fn execute(&self, kind: JobKind) -> Result<usize> {
        match kind {
            JobKind::PriceSnapshot => self.price_snapshot().await,
            JobKind::DeliverySnapshot => self.delivery_snapshot().await,
            JobKind::Cleanup => self.cleanup().await,
        }
    }

    async fn price_snapshot(&self) -> Result<usize> {
        let today = Local::now().date_naive();
        let quotes = self.fetcher.fetch_direct(self.registry.symbols()).await;

        if quotes.is_empty() {
            bail!(
                "No quotes fetched from {} for {} symbols",
                self.fetcher.provider_name(),
                self.registry.len()
            );
        }

        let records: Vec<PriceRecord> = quotes
            .into_iter()
            .map(|q| PriceRecord {
                industry: self.registry.primary_industry(&q.symbol).map(String::from),
                symbol: q.symbol,
                date: today,
                company_name: q.company_name,
                last_price: q.last_price,
                percent_change: q.percent_change,
            })
            .collect();

        self.storage.upsert_prices(&records).await
    }

    async fn delivery_snapshot(&self) -> Result<usize> {
        let today = Local::now().date_naive();

        let records: Vec<DeliveryRecord> = self
            .registry
            .symbols()
            .iter()
            .map(|symbol| {
                let stats = self.analytics.delivery_stats(symbol, today);
                DeliveryRecord {
                    symbol: stats.symbol,
                    date: stats.date,
                    traded_quantity: stats.traded_quantity,
                    delivery_quantity: stats.delivery_quantity,
                    delivery_percent: stats.delivery_percent,
                }
            })
            .collect();

        self.storage.upsert_deliveries(&records).await
    }

    async fn cleanup(&self) -> Result<usize> {
        let report = self.storage.purge_older_than(self.retention_days).await?;
        Ok(report.total())
    }
}

// ============================================================================
// Tests
// ============================================================================
