//! # Retry Scheduler
//!
//! Recurring tick that finds task executions due for retry, resets them
//! and re-dispatches. Tasks the scheduler repeatedly fails to drive get
//! their workflow force-redriven so it can take its failure path. A
//! slower maintenance sweep reports stuck workflows and purges old
//! terminal executions.

use crate::config::{RetentionConfig, SchedulerConfig};
use crate::engine::WorkflowEngine;
use crate::services::{TaskExecutionService, WorkflowExecutionService};
use crate::state_machine::{TaskStatus, WorkflowStatus};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Consecutive tick-level drive failures tolerated per task before the
/// owning workflow is force-redriven.
const DRIVE_FAILURE_LIMIT: u32 = 3;

/// Number of retry ticks between maintenance sweeps.
const MAINTENANCE_EVERY_TICKS: u64 = 20;

/// Recurring scheduler for retries and maintenance.
pub struct RetryScheduler {
    task_service: Arc<TaskExecutionService>,
    workflow_service: Arc<WorkflowExecutionService>,
    engine: Arc<WorkflowEngine>,
    scheduler_config: SchedulerConfig,
    retention_config: RetentionConfig,
    /// Per-task consecutive drive failures across ticks
    drive_failures: Mutex<HashMap<Uuid, u32>>,
}

impl RetryScheduler {
    pub fn new(
        task_service: Arc<TaskExecutionService>,
        workflow_service: Arc<WorkflowExecutionService>,
        engine: Arc<WorkflowEngine>,
        scheduler_config: SchedulerConfig,
        retention_config: RetentionConfig,
    ) -> Self {
        Self {
            task_service,
            workflow_service,
            engine,
            scheduler_config,
            retention_config,
            drive_failures: Mutex::new(HashMap::new()),
        }
    }

    /// Launch the recurring tick loop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let tick = Duration::from_secs(self.scheduler_config.tick_seconds.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut ticks: u64 = 0;
            loop {
                interval.tick().await;
                self.retry_due_tasks().await;
                ticks += 1;
                if ticks % MAINTENANCE_EVERY_TICKS == 0 {
                    self.run_maintenance().await;
                }
            }
        })
    }

    /// One retry tick: reset and re-dispatch every due task.
    pub async fn retry_due_tasks(&self) {
        let due = match self.task_service.tasks_to_retry(Utc::now()).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "failed to query tasks due for retry");
                return;
            }
        };

        if due.is_empty() {
            return;
        }

        info!(count = due.len(), "re-dispatching tasks due for retry");

        for task in due {
            let task_id = task.id;
            let workflow_execution_id = task.workflow_execution_id;

            match self.redrive_task(task).await {
                Ok(()) => {
                    self.drive_failures.lock().await.remove(&task_id);
                    // Let the strategy pick up from the settled task
                    if let Err(e) = self.engine.execute_workflow(workflow_execution_id).await {
                        warn!(
                            workflow_execution_id = %workflow_execution_id,
                            error = %e,
                            "workflow re-drive after retry failed"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        task_execution_id = %task_id,
                        error = %e,
                        "failed to re-dispatch task for retry"
                    );
                    let strikes = {
                        let mut failures = self.drive_failures.lock().await;
                        let strikes = failures.entry(task_id).or_insert(0);
                        *strikes += 1;
                        *strikes
                    };

                    if strikes >= DRIVE_FAILURE_LIMIT {
                        warn!(
                            task_execution_id = %task_id,
                            workflow_execution_id = %workflow_execution_id,
                            "task repeatedly failed to re-dispatch, forcing workflow recovery"
                        );
                        self.drive_failures.lock().await.remove(&task_id);
                        if let Err(e) = self.engine.execute_workflow(workflow_execution_id).await {
                            error!(
                                workflow_execution_id = %workflow_execution_id,
                                error = %e,
                                "forced workflow recovery failed"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Reset a due task for another attempt and dispatch it.
    async fn redrive_task(&self, mut task: crate::models::TaskExecution) -> crate::error::Result<()> {
        let task_id = task.id;
        task.status = TaskStatus::Pending;
        task.started_at = None;
        task.completed_at = None;
        task.next_retry_at = None;
        let task = self.task_service.save(task).await?;

        if let Err(e) = self.task_service.execute(task.id).await {
            // Put the task back in the retry queue so later ticks keep
            // striking until workflow-level recovery kicks in
            if let Ok(mut stuck) = self.task_service.get(task_id).await {
                if !stuck.status.is_terminal() {
                    stuck.status = TaskStatus::AwaitingRetry;
                    stuck.next_retry_at = Some(Utc::now() + ChronoDuration::seconds(1));
                    let _ = self.task_service.save(stuck).await;
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Report long-suspended workflows and purge old terminal ones.
    pub async fn run_maintenance(&self) {
        let now = Utc::now();
        let stuck_cutoff = now - ChronoDuration::hours(self.scheduler_config.stuck_threshold_hours);

        match self.workflow_service.find_paused_older_than(stuck_cutoff).await {
            Ok(stuck) => {
                for workflow in stuck {
                    warn!(
                        workflow_execution_id = %workflow.id,
                        correlation_id = %workflow.correlation_id,
                        started_at = ?workflow.started_at,
                        "workflow has been paused past the stuck threshold"
                    );
                }
            }
            Err(e) => error!(error = %e, "stuck-workflow query failed"),
        }

        match self
            .workflow_service
            .list_by_status(WorkflowStatus::AwaitingUserReview)
            .await
        {
            Ok(waiting) => {
                for workflow in waiting {
                    let reference = workflow.started_at.unwrap_or(workflow.created_at);
                    if reference < stuck_cutoff {
                        warn!(
                            workflow_execution_id = %workflow.id,
                            correlation_id = %workflow.correlation_id,
                            "workflow has been awaiting review past the stuck threshold"
                        );
                    }
                }
            }
            Err(e) => error!(error = %e, "awaiting-review query failed"),
        }

        let retention_cutoff = now - ChronoDuration::days(self.retention_config.terminal_days);
        match self
            .workflow_service
            .find_completed_older_than(retention_cutoff)
            .await
        {
            Ok(expired) => {
                for workflow in expired {
                    debug!(
                        workflow_execution_id = %workflow.id,
                        completed_at = ?workflow.completed_at,
                        "purging terminal workflow past retention"
                    );
                    if let Err(e) = self.workflow_service.delete(workflow.id).await {
                        error!(
                            workflow_execution_id = %workflow.id,
                            error = %e,
                            "retention purge failed"
                        );
                    }
                }
            }
            Err(e) => error!(error = %e, "retention query failed"),
        }
    }

    /// Clear the per-task failure counters.
    pub async fn cleanup_retry_tracker(&self) {
        self.drive_failures.lock().await.clear();
    }
}
