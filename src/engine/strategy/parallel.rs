//! Parallel execution: all remaining tasks are dispatched concurrently
//! under a bounded pool, then awaited together. Branch targets are
//! ignored; the workflow reaches a terminal status only after every task
//! has settled.

use crate::engine::strategy::ordered::build_inputs;
use crate::engine::strategy::{ExecutionStrategy, StrategyServices};
use crate::error::{Result, WorkflowError};
use crate::models::{StrategyType, TaskDefinition, TaskExecution, WorkflowExecution};
use crate::state_machine::{TaskStatus, WorkflowStatus};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

/// Dispatches tasks concurrently and aggregates their outcomes.
pub struct ParallelStrategy {
    services: StrategyServices,
    semaphore: Arc<Semaphore>,
}

impl ParallelStrategy {
    pub fn new(services: StrategyServices) -> Self {
        let permits = services.thread_pool_size.max(1);
        Self {
            services,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Bring one definition's task to a settled-or-suspended state.
    async fn drive_one(
        &self,
        workflow: &WorkflowExecution,
        task_definition: &TaskDefinition,
    ) -> Result<TaskExecution> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| WorkflowError::TaskExecution("task pool closed".to_string()))?;

        let existing = self
            .services
            .task_service
            .latest_for_definition(workflow.id, task_definition.id)
            .await?;

        match existing {
            Some(task) if task.status.is_terminal() => Ok(task),
            Some(task) if task.status == TaskStatus::Running => Ok(task),
            // Due retries are re-dispatched by the retry scheduler
            Some(task) if task.status == TaskStatus::AwaitingRetry => Ok(task),
            Some(task) => self.services.task_service.execute(task.id).await,
            None => {
                let inputs = build_inputs(workflow, task_definition);
                let created = self
                    .services
                    .task_service
                    .create(workflow, task_definition, inputs)
                    .await?;
                self.services.task_service.execute(created.id).await
            }
        }
    }

    /// Gate the batch on any review-bearing task that has not settled.
    async fn open_review_gate(
        &self,
        workflow: &WorkflowExecution,
        definitions: &[TaskDefinition],
    ) -> Result<bool> {
        let mut suspended = false;
        for task_definition in definitions.iter().filter(|d| d.require_user_review) {
            let existing = self
                .services
                .task_service
                .latest_for_definition(workflow.id, task_definition.id)
                .await?;

            match existing {
                // Settled, retrying or in-flight tasks are handled by
                // the aggregate verdict
                Some(task) if task.status != TaskStatus::Pending => continue,
                Some(task) => {
                    if self
                        .services
                        .task_service
                        .open_review_for_task(task.id)
                        .await?
                        .is_none()
                    {
                        // Reset or restarted task: ask for review again
                        self.services
                            .task_service
                            .create_review_point(task.id)
                            .await?;
                    }
                    suspended = true;
                }
                None => {
                    let inputs = build_inputs(workflow, task_definition);
                    let created = self
                        .services
                        .task_service
                        .create(workflow, task_definition, inputs)
                        .await?;
                    self.services
                        .task_service
                        .create_review_point(created.id)
                        .await?;
                    suspended = true;
                }
            }
        }
        Ok(suspended)
    }

    /// Drive a set of definitions concurrently and fold their statuses
    /// into a workflow status.
    async fn drive_all(
        &self,
        workflow_execution_id: Uuid,
        definitions: Vec<TaskDefinition>,
    ) -> Result<WorkflowStatus> {
        let mut workflow = self.services.workflow_service.get(workflow_execution_id).await?;

        let runs = definitions
            .iter()
            .filter(|d| !d.require_user_review)
            .map(|task_definition| self.drive_one(&workflow, task_definition));
        let outcomes = join_all(runs).await;

        let mut statuses = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(task) => {
                    if task.status == TaskStatus::Completed {
                        workflow.variables.extend(task.outputs.clone());
                    }
                    if task.status == TaskStatus::Failed {
                        workflow.error_message = task.error_message.clone();
                    }
                    statuses.push(task.status);
                }
                Err(e) => {
                    warn!(error = %e, "parallel task drive failed");
                    workflow.error_message = Some(e.to_string());
                    statuses.push(TaskStatus::Failed);
                }
            }
        }

        // Review-bearing tasks already settled count toward the verdict
        for task_definition in definitions.iter().filter(|d| d.require_user_review) {
            if let Some(task) = self
                .services
                .task_service
                .latest_for_definition(workflow.id, task_definition.id)
                .await?
            {
                if task.status == TaskStatus::Completed {
                    workflow.variables.extend(task.outputs.clone());
                }
                statuses.push(task.status);
            }
        }

        // Persist only the fields the strategy owns; status may have
        // moved underneath the drive (cancellation)
        let mut current = self.services.workflow_service.get(workflow.id).await?;
        current.variables = workflow.variables.clone();
        current.error_message = workflow.error_message.clone();
        self.services.workflow_service.save(current).await?;

        if statuses.iter().any(|s| *s == TaskStatus::Failed) {
            Ok(WorkflowStatus::Failed)
        } else if statuses.iter().all(|s| s.is_successful()) {
            Ok(WorkflowStatus::Completed)
        } else {
            // Retries pending or queued results outstanding
            Ok(WorkflowStatus::Running)
        }
    }
}

#[async_trait]
impl ExecutionStrategy for ParallelStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Parallel
    }

    async fn execute(&self, workflow: &WorkflowExecution) -> Result<WorkflowStatus> {
        let fresh = self.services.workflow_service.get(workflow.id).await?;
        let definition = self
            .services
            .definitions
            .get(fresh.workflow_definition_id)
            .await?;

        let remaining: Vec<TaskDefinition> = definition
            .tasks
            .iter()
            .skip(fresh.current_task_index)
            .cloned()
            .collect();

        if remaining.is_empty() {
            return Ok(WorkflowStatus::Completed);
        }

        if self.open_review_gate(&fresh, &remaining).await? {
            return Ok(WorkflowStatus::AwaitingUserReview);
        }

        self.drive_all(fresh.id, remaining).await
    }

    async fn execute_subset(
        &self,
        workflow: &WorkflowExecution,
        task_definition_ids: Vec<Uuid>,
    ) -> Result<WorkflowStatus> {
        let fresh = self.services.workflow_service.get(workflow.id).await?;
        let definition = self
            .services
            .definitions
            .get(fresh.workflow_definition_id)
            .await?;

        let mut selected: Vec<TaskDefinition> = definition
            .tasks
            .iter()
            .filter(|t| task_definition_ids.contains(&t.id))
            .cloned()
            .collect();

        if selected.is_empty() {
            return Ok(WorkflowStatus::Completed);
        }

        // Subset execution ignores review gates
        for task_definition in &mut selected {
            task_definition.require_user_review = false;
        }

        // Settled tasks are reset for another attempt; their retry
        // counts are kept.
        for task_definition in &selected {
            if let Some(mut task) = self
                .services
                .task_service
                .latest_for_definition(fresh.id, task_definition.id)
                .await?
            {
                if task.status != TaskStatus::Pending && task.status != TaskStatus::Cancelled {
                    task.status = TaskStatus::Pending;
                    task.started_at = None;
                    task.completed_at = None;
                    task.next_retry_at = None;
                    self.services.task_service.save(task).await?;
                }
            }
        }

        self.drive_all(fresh.id, selected).await
    }
}
