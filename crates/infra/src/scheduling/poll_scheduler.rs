//! Periodic reconciliation poll
//!
//! Cron-driven safety net behind the webhook path: every tick, each
//! companion with a connected calendar gets a fresh reconciliation for the
//! next few days. Join handles are tracked, cancellation is explicit, and
//! every asynchronous operation is wrapped in a timeout.

use std::sync::Arc;
use std::time::Duration;

use amity_core::availability::ReconcilerService;
use amity_core::companion_ports::CompanionRepository;
use chrono::{Days, Utc};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the reconciliation poller.
#[derive(Debug, Clone)]
pub struct ReconcilePollerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// How many days ahead each tick reconciles, starting today.
    pub poll_days: u64,
    /// Timeout applied to a single poll execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for ReconcilePollerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */15 * * * *".into(), // every 15 minutes
            poll_days: 2,
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Periodic reconciliation scheduler with explicit lifecycle management.
pub struct ReconcilePoller {
    scheduler: Option<JobScheduler>,
    config: ReconcilePollerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    reconciler: Arc<ReconcilerService>,
    companions: Arc<dyn CompanionRepository>,
}

impl ReconcilePoller {
    pub fn new(
        config: ReconcilePollerConfig,
        reconciler: Arc<ReconcilerService>,
        companions: Arc<dyn CompanionRepository>,
    ) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            reconciler,
            companions,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { duration: start_timeout })?;
        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("reconciliation poller monitor cancelled");
        });
        self.monitor_handle = Some(handle);

        info!(cron = %self.config.cron_expression, "reconciliation poller started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|_| SchedulerError::Timeout { duration: stop_timeout })?;
        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration: join_timeout })??;
        }

        info!("reconciliation poller stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let cron_expr = self.config.cron_expression.clone();
        let reconciler = self.reconciler.clone();
        let companions = self.companions.clone();
        let job_timeout = self.config.job_timeout;
        let poll_days = self.config.poll_days;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let reconciler = reconciler.clone();
            let companions = companions.clone();

            Box::pin(async move {
                match tokio::time::timeout(
                    job_timeout,
                    Self::poll_once(reconciler, companions, poll_days),
                )
                .await
                {
                    Ok(()) => debug!("reconciliation poll finished"),
                    Err(_) => {
                        warn!(timeout_secs = job_timeout.as_secs(), "reconciliation poll timed out")
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "registered reconciliation poll job");
        Ok(scheduler)
    }

    async fn poll_once(
        reconciler: Arc<ReconcilerService>,
        companions: Arc<dyn CompanionRepository>,
        poll_days: u64,
    ) {
        let ids = match companions.list_connected_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                error!(error = %err, "failed to list connected companions");
                return;
            }
        };

        if ids.is_empty() {
            debug!("no connected companions to poll");
            return;
        }

        let today = Utc::now().date_naive();
        let mut errors = 0usize;

        for companion_id in &ids {
            for offset in 0..poll_days {
                let Some(date) = today.checked_add_days(Days::new(offset)) else {
                    break;
                };
                if let Err(err) = reconciler.reconcile(*companion_id, date).await {
                    errors += 1;
                    warn!(%companion_id, %date, error = %err, "polled reconciliation failed");
                }
            }
        }

        info!(companions = ids.len(), errors, "reconciliation poll batch completed");
    }
}

impl Drop for ReconcilePoller {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ReconcilePoller dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
