//! SQLite persistence for daily snapshots and job runs.
//!
//! Tables:
//! - `price_history`: one row per (symbol, date), last write wins
//! - `delivery_history`: one row per (symbol, date), last write wins
//! - `job_logs`: one row per job run
//!
//! The request path never touches this module; only scheduled or manually
//! triggered jobs write to it, and the `/api/db/*` endpoints read from it.

use anyhow::{Context, Result};
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Daily price snapshots
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    company_name TEXT NOT NULL,
    industry TEXT,
    last_price REAL NOT NULL,
    percent_change REAL NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(symbol, date)
);

CREATE INDEX IF NOT EXISTS idx_price_history_symbol_date
ON price_history(symbol, date DESC);

-- Daily delivery snapshots
CREATE TABLE IF NOT EXISTS delivery_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    traded_quantity INTEGER NOT NULL,
    delivery_quantity INTEGER NOT NULL,
    delivery_percent REAL NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(symbol, date)
);

CREATE INDEX IF NOT EXISTS idx_delivery_history_symbol_date
ON delivery_history(symbol, date DESC);

-- Job run log
CREATE TABLE IF NOT EXISTS job_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    records_processed INTEGER NOT NULL DEFAULT 0,
    message TEXT
);

CREATE INDEX IF NOT EXISTS idx_job_logs_started
ON job_logs(started_at DESC);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Record Types
// ============================================================================

/// One persisted daily price row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub company_name: String,
    pub industry: Option<String>,
    pub last_price: f64,
    pub percent_change: f64,
}

/// One persisted daily delivery row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub traded_quantity: u64,
    pub delivery_quantity: u64,
    pub delivery_percent: f64,
}

/// Job run status as stored in `job_logs.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Running,
    Success,
    Failed,
}

impl JobRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

impl std::fmt::Display for JobRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One job run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLog {
    pub id: i64,
    pub job_name: String,
    pub status: JobRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records_processed: u64,
    pub message: Option<String>,
}

/// Rows removed by a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub prices: usize,
    pub deliveries: usize,
    pub job_logs: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.prices + self.deliveries + self.job_logs
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub price_rows: u64,
    pub delivery_rows: u64,
    pub job_log_rows: u64,
    pub unique_symbols: u64,
    pub db_size_bytes: u64,
}

fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// First date inside a `days` window ending today. Windows reaching past the
/// calendar start saturate at `NaiveDate::MIN`.
fn cutoff_date(days: u32) -> NaiveDate {
    Local::now()
        .date_naive()
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

// ============================================================================
// Storage
// ============================================================================

/// SQLite-backed snapshot store.
pub struct Storage {
    /// rusqlite::Connection is Send but not Sync; the async mutex serializes access
    db: Arc<Mutex<Connection>>,
    /// None for in-memory databases
    db_path: Option<PathBuf>,
}

impl Storage {
    /// Open (or create) the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path).context("Failed to open market database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        let storage = Self::init(conn, Some(path.to_path_buf()))?;
        info!(db_path = %path.display(), "Initialized market database");
        Ok(storage)
    }

    /// Open from `[storage]` config.
    pub fn from_config(config: &pulse_common::StorageConfig) -> Result<Self> {
        Self::open(&config.db_path)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    // ========================================================================
    // Price History
    // ========================================================================

    /// Insert or replace price rows keyed by (symbol, date).
    pub async fn upsert_prices(&self, records: &[PriceRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO price_history
                (symbol, date, company_name, industry, last_price, percent_change)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(symbol, date) DO UPDATE SET
                    company_name = excluded.company_name,
                    industry = excluded.industry,
                    last_price = excluded.last_price,
                    percent_change = excluded.percent_change,
                    created_at = CURRENT_TIMESTAMP
                "#,
            )?;

            for record in records {
                stmt.execute(params![
                    record.symbol,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.company_name,
                    record.industry,
                    record.last_price,
                    record.percent_change,
                ])?;
            }
        }
        tx.commit().context("Failed to commit price rows")?;

        debug!(count = records.len(), "Upserted price rows");
        Ok(records.len())
    }

    /// Price rows from the last `days` days, newest first.
    pub async fn price_history(&self, symbol: Option<&str>, days: u32) -> Result<Vec<PriceRecord>> {
        self.price_history_since(symbol, cutoff_date(days)).await
    }

    /// Price rows dated on or after `since`, newest first.
    pub async fn price_history_since(
        &self,
        symbol: Option<&str>,
        since: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        let db = self.db.lock().await;
        let since = since.format(DATE_FORMAT).to_string();

        let mut stmt = db.prepare(
            r#"
            SELECT symbol, date, company_name, industry, last_price, percent_change
            FROM price_history
            WHERE date >= ?1 AND (?2 IS NULL OR symbol = ?2)
            ORDER BY date DESC, symbol ASC
            "#,
        )?;

        let rows = stmt.query_map(params![since, symbol], Self::row_to_price)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read price history")
    }

    /// Rows from the most recent snapshot date, best performers first.
    pub async fn latest_prices(&self, limit: usize) -> Result<Vec<PriceRecord>> {
        let db = self.db.lock().await;

        let mut stmt = db.prepare(
            r#"
            SELECT symbol, date, company_name, industry, last_price, percent_change
            FROM price_history
            WHERE date = (SELECT MAX(date) FROM price_history)
            ORDER BY percent_change DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], Self::row_to_price)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read latest prices")
    }

    fn row_to_price(row: &rusqlite::Row) -> rusqlite::Result<PriceRecord> {
        let date: String = row.get(1)?;
        Ok(PriceRecord {
            symbol: row.get(0)?,
            date: parse_date(&date)?,
            company_name: row.get(2)?,
            industry: row.get(3)?,
            last_price: row.get(4)?,
            percent_change: row.get(5)?,
        })
    }

    // ========================================================================
    // Delivery History
    // ========================================================================

    /// Insert or replace delivery rows keyed by (symbol, date).
    pub async fn upsert_deliveries(&self, records: &[DeliveryRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO delivery_history
                (symbol, date, traded_quantity, delivery_quantity, delivery_percent)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(symbol, date) DO UPDATE SET
                    traded_quantity = excluded.traded_quantity,
                    delivery_quantity = excluded.delivery_quantity,
                    delivery_percent = excluded.delivery_percent,
                    created_at = CURRENT_TIMESTAMP
                "#,
            )?;

            for record in records {
                stmt.execute(params![
                    record.symbol,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.traded_quantity as i64,
                    record.delivery_quantity as i64,
                    record.delivery_percent,
                ])?;
            }
        }
        tx.commit().context("Failed to commit delivery rows")?;

        debug!(count = records.len(), "Upserted delivery rows");
        Ok(records.len())
    }

    /// Delivery rows for one symbol from the last `days` days, newest first.
    pub async fn delivery_history(&self, symbol: &str, days: u32) -> Result<Vec<DeliveryRecord>> {
        self.delivery_history_since(symbol, cutoff_date(days)).await
    }

    pub async fn delivery_history_since(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> Result<Vec<DeliveryRecord>> {
        let db = self.db.lock().await;

        let mut stmt = db.prepare(
            r#"
            SELECT symbol, date, traded_quantity, delivery_quantity, delivery_percent
            FROM delivery_history
            WHERE symbol = ?1 AND date >= ?2
            ORDER BY date DESC
            "#,
        )?;

        let rows = stmt.query_map(
            params![symbol, since.format(DATE_FORMAT).to_string()],
            |row| {
                let date: String = row.get(1)?;
                let traded: i64 = row.get(2)?;
                let delivered: i64 = row.get(3)?;
                Ok(DeliveryRecord {
                    symbol: row.get(0)?,
                    date: parse_date(&date)?,
                    traded_quantity: traded.max(0) as u64,
                    delivery_quantity: delivered.max(0) as u64,
                    delivery_percent: row.get(4)?,
                })
            },
        )?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read delivery history")
    }

    // ========================================================================
    // Job Logs
    // ========================================================================

    /// Open a `running` job log row and return its id.
    pub async fn start_job(&self, job_name: &str) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO job_logs (job_name, status, started_at) VALUES (?1, ?2, ?3)",
            params![job_name, JobRunStatus::Running.as_str(), Utc::now().to_rfc3339()],
        )
        .context("Failed to open job log")?;
        Ok(db.last_insert_rowid())
    }

    /// Close a job log row.
    pub async fn finish_job(
        &self,
        id: i64,
        status: JobRunStatus,
        records_processed: usize,
        message: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let updated = db
            .execute(
                r#"
                UPDATE job_logs
                SET status = ?1, finished_at = ?2, records_processed = ?3, message = ?4
                WHERE id = ?5
                "#,
                params![
                    status.as_str(),
                    Utc::now().to_rfc3339(),
                    records_processed as i64,
                    message,
                    id
                ],
            )
            .context("Failed to close job log")?;

        if updated == 0 {
            anyhow::bail!("Job log {} not found", id);
        }
        Ok(())
    }

    /// Most recent job runs, newest first.
    pub async fn job_logs(&self, limit: usize) -> Result<Vec<JobLog>> {
        let db = self.db.lock().await;

        let mut stmt = db.prepare(
            r#"
            SELECT id, job_name, status, started_at, finished_at, records_processed, message
            FROM job_logs
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], Self::row_to_job_log)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read job logs")
    }

    /// Start time of the latest run of `job_name`.
    pub async fn last_job_run(&self, job_name: &str) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let started: Option<String> = db
            .query_row(
                "SELECT started_at FROM job_logs WHERE job_name = ?1 ORDER BY id DESC LIMIT 1",
                params![job_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(started.as_deref().and_then(parse_timestamp))
    }

    fn row_to_job_log(row: &rusqlite::Row) -> rusqlite::Result<JobLog> {
        let status: String = row.get(2)?;
        let started: String = row.get(3)?;
        let finished: Option<String> = row.get(4)?;
        let records: i64 = row.get(5)?;

        Ok(JobLog {
            id: row.get(0)?,
            job_name: row.get(1)?,
            status: JobRunStatus::from_db(&status),
            started_at: parse_timestamp(&started).unwrap_or_else(Utc::now),
            finished_at: finished.as_deref().and_then(parse_timestamp),
            records_processed: records.max(0) as u64,
            message: row.get(6)?,
        })
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Delete rows older than `days` days.
    pub async fn purge_older_than(&self, days: u32) -> Result<PurgeReport> {
        self.purge_before(cutoff_date(days)).await
    }

    /// Delete rows dated strictly before `cutoff`.
    pub async fn purge_before(&self, cutoff: NaiveDate) -> Result<PurgeReport> {
        let db = self.db.lock().await;
        let cutoff = cutoff.format(DATE_FORMAT).to_string();

        let prices = db.execute("DELETE FROM price_history WHERE date < ?1", params![cutoff])?;
        let deliveries =
            db.execute("DELETE FROM delivery_history WHERE date < ?1", params![cutoff])?;
        // RFC 3339 timestamps compare correctly against a bare date prefix
        let job_logs = db.execute(
            "DELETE FROM job_logs WHERE started_at < ?1 AND status != 'running'",
            params![cutoff],
        )?;

        let report = PurgeReport {
            prices,
            deliveries,
            job_logs,
        };

        info!(
            cutoff = %cutoff,
            prices = report.prices,
            deliveries = report.deliveries,
            job_logs = report.job_logs,
            "Purged old rows"
        );

        Ok(report)
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<StorageStats> {
        let db = self.db.lock().await;

        let count = |sql: &str| -> Result<u64> {
            let n: i64 = db.query_row(sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        };

        let price_rows = count("SELECT COUNT(*) FROM price_history")?;
        let delivery_rows = count("SELECT COUNT(*) FROM delivery_history")?;
        let job_log_rows = count("SELECT COUNT(*) FROM job_logs")?;
        let unique_symbols = count("SELECT COUNT(DISTINCT symbol) FROM price_history")?;

        let db_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StorageStats {
            price_rows,
            delivery_rows,
            job_log_rows,
            unique_symbols,
            db_size_bytes,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn create_test_storage() -> (TempDir, Storage) {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("nested").join("market.db")).unwrap();
        (dir, storage)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn price(symbol: &str, day: &str, last: f64, pct: f64) -> PriceRecord {
        PriceRecord {
            symbol: symbol.to_string(),
            date: date(day),
            company_name: format!("{} Ltd", symbol),
            industry: Some("Information Technology".to_string()),
            last_price: last,
            percent_change: pct,
        }
    }

    #[tokio::test]
    async fn test_storage_creation() {
        let (_dir, storage) = create_test_storage();
        assert!(storage.db_path().unwrap().exists());
        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.price_rows, 0);
        assert!(stats.db_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_price_upsert_last_write_wins() {
        let storage = Storage::in_memory().unwrap();

        storage
            .upsert_prices(&[price("TCS", "2024-06-03", 3800.0, 1.0)])
            .await
            .unwrap();
        storage
            .upsert_prices(&[price("TCS", "2024-06-03", 3850.0, 2.3)])
            .await
            .unwrap();

        let rows = storage
            .price_history_since(Some("TCS"), date("2024-01-01"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].last_price, 3850.0);
        assert_eq!(rows[0].percent_change, 2.3);
    }

    #[tokio::test]
    async fn test_price_history_filters() {
        let storage = Storage::in_memory().unwrap();
        storage
            .upsert_prices(&[
                price("TCS", "2024-06-01", 1.0, 0.1),
                price("TCS", "2024-06-03", 1.0, 0.2),
                price("INFY", "2024-06-03", 1.0, 0.3),
            ])
            .await
            .unwrap();

        let tcs = storage
            .price_history_since(Some("TCS"), date("2024-06-02"))
            .await
            .unwrap();
        assert_eq!(tcs.len(), 1);
        assert_eq!(tcs[0].date, date("2024-06-03"));

        let all = storage
            .price_history_since(None, date("2024-01-01"))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].symbol, "INFY");
    }

    #[tokio::test]
    async fn test_price_history_by_days() {
        let storage = Storage::in_memory().unwrap();
        let today = Local::now().date_naive();
        let mut record = price("TCS", "2000-01-01", 1.0, 0.1);
        record.date = today;
        storage.upsert_prices(&[record]).await.unwrap();

        assert_eq!(storage.price_history(Some("TCS"), 30).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_prices() {
        let storage = Storage::in_memory().unwrap();
        storage
            .upsert_prices(&[
                price("TCS", "2024-06-01", 1.0, 9.0),
                price("TCS", "2024-06-03", 1.0, -1.0),
                price("INFY", "2024-06-03", 1.0, 2.0),
            ])
            .await
            .unwrap();

        let latest = storage.latest_prices(10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].symbol, "INFY");
    }

    #[tokio::test]
    async fn test_delivery_upsert_and_history() {
        let storage = Storage::in_memory().unwrap();
        let record = DeliveryRecord {
            symbol: "ITC".to_string(),
            date: date("2024-06-03"),
            traded_quantity: 1_000_000,
            delivery_quantity: 450_000,
            delivery_percent: 45.0,
        };
        storage.upsert_deliveries(&[record.clone()]).await.unwrap();

        let updated = DeliveryRecord {
            delivery_quantity: 500_000,
            delivery_percent: 50.0,
            ..record
        };
        storage.upsert_deliveries(&[updated]).await.unwrap();

        let rows = storage
            .delivery_history_since("ITC", date("2024-01-01"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].delivery_quantity, 500_000);
        assert!(storage
            .delivery_history_since("TCS", date("2024-01-01"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_job_log_lifecycle() {
        let storage = Storage::in_memory().unwrap();

        let id = storage.start_job("price_snapshot").await.unwrap();
        let logs = storage.job_logs(10).await.unwrap();
        assert_eq!(logs[0].status, JobRunStatus::Running);
        assert!(logs[0].finished_at.is_none());

        storage
            .finish_job(id, JobRunStatus::Success, 42, Some("ok"))
            .await
            .unwrap();

        let logs = storage.job_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, JobRunStatus::Success);
        assert_eq!(logs[0].records_processed, 42);
        assert_eq!(logs[0].message.as_deref(), Some("ok"));
        assert!(logs[0].finished_at.is_some());

        assert!(storage
            .last_job_run("price_snapshot")
            .await
            .unwrap()
            .is_some());
        assert!(storage.last_job_run("cleanup").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_unknown_job_fails() {
        let storage = Storage::in_memory().unwrap();
        assert!(storage
            .finish_job(99, JobRunStatus::Failed, 0, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_purge_before() {
        let storage = Storage::in_memory().unwrap();
        storage
            .upsert_prices(&[
                price("TCS", "2023-01-01", 1.0, 0.1),
                price("TCS", "2024-06-03", 1.0, 0.2),
            ])
            .await
            .unwrap();
        let id = storage.start_job("cleanup").await.unwrap();
        storage
            .finish_job(id, JobRunStatus::Success, 0, None)
            .await
            .unwrap();

        let report = storage.purge_before(date("2024-01-01")).await.unwrap();
        assert_eq!(report.prices, 1);
        assert_eq!(report.deliveries, 0);
        // Job log started today survives a 2024 cutoff
        assert_eq!(report.job_logs, 0);
        assert_eq!(report.total(), 1);

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.price_rows, 1);
        assert_eq!(stats.job_log_rows, 1);
        assert_eq!(stats.unique_symbols, 1);
    }

    #[tokio::test]
    async fn test_unbounded_day_window_saturates() {
        let storage = Storage::in_memory().unwrap();
        let today = Local::now().date_naive().format(DATE_FORMAT).to_string();
        storage
            .upsert_prices(&[price("TCS", &today, 3900.0, 0.5), price("INFY", "2001-01-02", 90.0, 1.0)])
            .await
            .unwrap();

        assert_eq!(cutoff_date(u32::MAX), NaiveDate::MIN);
        assert_eq!(storage.price_history(None, u32::MAX).await.unwrap().len(), 2);

        let report = storage.purge_older_than(u32::MAX).await.unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(storage.price_history(None, u32::MAX).await.unwrap().len(), 2);
    }
}
