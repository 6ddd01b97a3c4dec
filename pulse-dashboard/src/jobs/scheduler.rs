//! Cron scheduler for the snapshot and cleanup jobs.
//!
//! Expressions are evaluated in local time. NSE closes at 15:30 IST, so
//! the defaults snapshot prices at 15:45 and delivery figures at 18:00 on
//! weekdays, and clean up at 02:00 on Sunday.
//!
//! # Schedule Configuration
//!
//! ```json
//! {
//!   "jobs": {
//!     "enabled": true,
//!     "price_snapshot_cron": "0 45 15 * * MON-FRI",
//!     "delivery_snapshot_cron": "0 0 18 * * MON-FRI",
//!     "cleanup_cron": "0 0 2 * * SUN"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use cron::Schedule;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use super::{JobKind, JobRunner};
use crate::storage::JobRunStatus;
use pulse_common::JobsConfig;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scheduler not started
    Stopped,
    /// Scheduler running
    Running,
}

/// A parsed schedule with its job
struct ParsedSchedule {
    kind: JobKind,
    expression: String,
    schedule: Schedule,
}

/// Per-job schedule view for `/api/jobs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job: JobKind,
    pub cron: String,
    pub scheduled: bool,
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Local>>,
}

/// Cron-driven job scheduler
pub struct JobScheduler {
    enabled: bool,
    runner: Arc<JobRunner>,
    state: Arc<RwLock<SchedulerState>>,
    schedules: Vec<ParsedSchedule>,
    /// Last cron-triggered execution per job
    last_executions: Arc<RwLock<HashMap<JobKind, DateTime<Local>>>>,
}

impl JobScheduler {
    /// Create a new scheduler. Fails on an invalid cron expression.
    pub fn new(config: &JobsConfig, runner: Arc<JobRunner>) -> Result<Self> {
        let entries = [
            (JobKind::PriceSnapshot, &config.price_snapshot_cron),
            (JobKind::DeliverySnapshot, &config.delivery_snapshot_cron),
            (JobKind::Cleanup, &config.cleanup_cron),
        ];

        let mut schedules = Vec::with_capacity(entries.len());
        for (kind, expression) in entries {
            let schedule = Schedule::from_str(expression)
                .with_context(|| format!("Invalid {} cron: {}", kind, expression))?;
            schedules.push(ParsedSchedule {
                kind,
                expression: expression.clone(),
                schedule,
            });
        }

        if config.enabled {
            info!(
                price = %config.price_snapshot_cron,
                delivery = %config.delivery_snapshot_cron,
                cleanup = %config.cleanup_cron,
                "Scheduler configured"
            );
        }

        Ok(Self {
            enabled: config.enabled,
            runner,
            state: Arc::new(RwLock::new(SchedulerState::Stopped)),
            schedules,
            last_executions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        *state = SchedulerState::Stopped;
        info!("Scheduler stopped");
    }

    /// Run the scheduler loop
    pub async fn run(&self) -> Result<()> {
        if !self.enabled {
            info!("Scheduler disabled, not starting");
            return Ok(());
        }

        {
            let mut state = self.state.write().await;
            *state = SchedulerState::Running;
        }

        info!(jobs = self.schedules.len(), "Scheduler started");

        // Check every 10 seconds
        let mut check_interval = interval(Duration::from_secs(10));

        loop {
            check_interval.tick().await;

            if *self.state.read().await == SchedulerState::Stopped {
                break;
            }

            for kind in self.due_jobs(Local::now()).await {
                self.execute_job(kind).await;
            }
        }

        Ok(())
    }

    /// Jobs whose scheduled time passed within the last minute and have not
    /// yet run for that slot.
    async fn due_jobs(&self, now: DateTime<Local>) -> Vec<JobKind> {
        let executions = self.last_executions.read().await;
        self.schedules
            .iter()
            .filter(|parsed| {
                should_execute(&parsed.schedule, executions.get(&parsed.kind).copied(), now)
            })
            .map(|parsed| parsed.kind)
            .collect()
    }

    async fn execute_job(&self, kind: JobKind) {
        info!(job = kind.name(), "Executing scheduled job");

        {
            let mut executions = self.last_executions.write().await;
            executions.insert(kind, Local::now());
        }

        match self.runner.run(kind).await {
            Ok(report) if report.status == JobRunStatus::Failed => {
                error!(job = kind.name(), log_id = report.log_id, "Scheduled job failed");
            }
            Ok(_) => {}
            Err(e) => warn!(job = kind.name(), error = %e, "Scheduled job not started"),
        }
    }

    /// Cron, last run and next run for each job.
    pub async fn status(&self) -> Vec<JobStatus> {
        let mut jobs = Vec::with_capacity(self.schedules.len());

        for parsed in &self.schedules {
            jobs.push(JobStatus {
                job: parsed.kind,
                cron: parsed.expression.clone(),
                scheduled: self.enabled,
                running: self.runner.is_running(parsed.kind),
                last_run: self.runner.last_run(parsed.kind).await,
                next_run: parsed.schedule.upcoming(Local).next(),
            });
        }

        jobs
    }

    /// Get next scheduled times for each job, soonest first
    pub fn get_next_schedules(&self) -> Vec<(JobKind, DateTime<Local>)> {
        let mut next_times: Vec<_> = self
            .schedules
            .iter()
            .filter_map(|parsed| {
                parsed
                    .schedule
                    .upcoming(Local)
                    .next()
                    .map(|next| (parsed.kind, next))
            })
            .collect();

        next_times.sort_by_key(|(_, time)| *time);
        next_times
    }
}

/// Whether a schedule has a slot in `(last_exec, now]` no older than 60 s.
fn should_execute(
    schedule: &Schedule,
    last_exec: Option<DateTime<Local>>,
    now: DateTime<Local>,
) -> bool {
    let after = last_exec.unwrap_or_else(|| now - chrono::Duration::hours(1));

    for scheduled in schedule.after(&after).take(10) {
        if scheduled > now {
            break;
        }
        if now.signed_duration_since(scheduled) < chrono::Duration::seconds(60) {
            if let Some(last) = last_exec {
                if last >= scheduled {
                    continue;
                }
            }
            return true;
        }
    }

    false
}
