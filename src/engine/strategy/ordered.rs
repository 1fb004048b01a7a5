//! Shared driver for the order-following strategies.
//!
//! Sequential and conditional execution differ only in the condition
//! gate, so both wrap this driver. It walks the definition's ordered
//! tasks from `current_task_index`, consulting persisted task state
//! first so that re-drives (after retries, reviews or async results)
//! pick up exactly where the run suspended.

use crate::context::ExecutionContext;
use crate::error::{Result, WorkflowError};
use crate::expression;
use crate::models::{TaskDefinition, WorkflowDefinition, WorkflowExecution};
use crate::state_machine::{TaskStatus, WorkflowStatus};
use crate::engine::strategy::StrategyServices;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Drives tasks one at a time in execution order.
pub(crate) struct OrderedDriver {
    services: StrategyServices,
    /// Evaluate `conditional_expression` gates (conditional strategy)
    evaluate_conditions: bool,
}

enum StepOutcome {
    /// Move to the task at the given index
    Next(usize),
    /// Leave the workflow in the given non-terminal status
    Suspend(WorkflowStatus),
    /// The workflow reached a terminal result
    Finish(WorkflowStatus),
}

impl OrderedDriver {
    pub(crate) fn new(services: StrategyServices, evaluate_conditions: bool) -> Self {
        Self {
            services,
            evaluate_conditions,
        }
    }

    /// Drive the workflow from its persisted index to a verdict.
    pub(crate) async fn drive(&self, workflow_execution_id: Uuid) -> Result<WorkflowStatus> {
        let mut workflow = self.services.workflow_service.get(workflow_execution_id).await?;
        let definition = self
            .services
            .definitions
            .get(workflow.workflow_definition_id)
            .await?;

        let mut index = workflow.current_task_index;
        // Guard against jump cycles in mis-authored definitions
        let mut steps_taken = 0usize;
        let step_budget = (definition.tasks.len() + 1) * 8;

        loop {
            if index >= definition.tasks.len() {
                workflow.current_task_index = index;
                self.persist_progress(&workflow).await?;
                return Ok(WorkflowStatus::Completed);
            }

            steps_taken += 1;
            if steps_taken > step_budget {
                return Err(WorkflowError::Validation(format!(
                    "task jump cycle detected in definition '{}'",
                    definition.name
                )));
            }

            workflow.current_task_index = index;
            let task_definition = definition.tasks[index].clone();

            match self.drive_task(&mut workflow, &definition, &task_definition, index).await? {
                StepOutcome::Next(next_index) => index = next_index,
                StepOutcome::Suspend(status) | StepOutcome::Finish(status) => {
                    self.persist_progress(&workflow).await?;
                    return Ok(status);
                }
            }
        }
    }

    /// Persist the fields the driving strategy owns (index, variables,
    /// error message) without touching status, which may have moved
    /// underneath a long drive (cancellation).
    async fn persist_progress(&self, workflow: &WorkflowExecution) -> Result<()> {
        let mut current = self.services.workflow_service.get(workflow.id).await?;
        current.current_task_index = workflow.current_task_index;
        current.variables = workflow.variables.clone();
        current.error_message = workflow.error_message.clone();
        self.services.workflow_service.save(current).await?;
        Ok(())
    }

    /// Drive the listed definitions in execution order, ignoring review
    /// gates and branching.
    pub(crate) async fn drive_subset(
        &self,
        workflow_execution_id: Uuid,
        task_definition_ids: Vec<Uuid>,
    ) -> Result<WorkflowStatus> {
        let mut workflow = self.services.workflow_service.get(workflow_execution_id).await?;
        let definition = self
            .services
            .definitions
            .get(workflow.workflow_definition_id)
            .await?;

        let selected: Vec<TaskDefinition> = definition
            .tasks
            .iter()
            .filter(|t| task_definition_ids.contains(&t.id))
            .cloned()
            .collect();

        if selected.is_empty() {
            return Ok(WorkflowStatus::Completed);
        }

        let mut saw_failure = false;
        let mut saw_open = false;

        for task_definition in &selected {
            let task = self.run_for_subset(&workflow, task_definition).await?;
            match task.status {
                TaskStatus::Completed => {
                    workflow.variables.extend(task.outputs.clone());
                    self.persist_progress(&workflow).await?;
                }
                TaskStatus::Failed => {
                    workflow.error_message = task.error_message.clone();
                    self.persist_progress(&workflow).await?;
                    saw_failure = true;
                }
                TaskStatus::AwaitingRetry | TaskStatus::Running => saw_open = true,
                _ => {}
            }
        }

        if saw_failure {
            Ok(WorkflowStatus::Failed)
        } else if saw_open {
            Ok(WorkflowStatus::Running)
        } else {
            Ok(WorkflowStatus::Completed)
        }
    }

    /// Re-run one definition for subset execution, reusing the latest
    /// task record so its retry count survives.
    async fn run_for_subset(
        &self,
        workflow: &WorkflowExecution,
        task_definition: &TaskDefinition,
    ) -> Result<crate::models::TaskExecution> {
        let existing = self
            .services
            .task_service
            .latest_for_definition(workflow.id, task_definition.id)
            .await?;

        let task = match existing {
            Some(mut task) if task.status != TaskStatus::Cancelled => {
                if task.status.is_dispatchable() {
                    task
                } else {
                    task.status = TaskStatus::Pending;
                    task.started_at = None;
                    task.completed_at = None;
                    task.next_retry_at = None;
                    self.services.task_service.save(task).await?
                }
            }
            _ => {
                let inputs = build_inputs(workflow, task_definition);
                self.services
                    .task_service
                    .create(workflow, task_definition, inputs)
                    .await?
            }
        };

        self.services.task_service.execute(task.id).await
    }

    async fn drive_task(
        &self,
        workflow: &mut WorkflowExecution,
        definition: &WorkflowDefinition,
        task_definition: &TaskDefinition,
        index: usize,
    ) -> Result<StepOutcome> {
        // Condition gate (conditional strategy only)
        if self.evaluate_conditions {
            if let Some(expr) = &task_definition.conditional_expression {
                if !self.condition_holds(expr, workflow, task_definition) {
                    return self.skip_task(workflow, task_definition, index).await;
                }
            }
        }

        let existing = self
            .services
            .task_service
            .latest_for_definition(workflow.id, task_definition.id)
            .await?;

        let task = match existing {
            Some(task) => match task.status {
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped => task,
                TaskStatus::Cancelled => return Ok(StepOutcome::Finish(WorkflowStatus::Cancelled)),
                TaskStatus::AwaitingRetry => {
                    // The retry scheduler re-drives once the task is due
                    return Ok(StepOutcome::Suspend(WorkflowStatus::Running));
                }
                TaskStatus::Running => {
                    // Queued task awaiting its asynchronous result
                    return Ok(StepOutcome::Suspend(WorkflowStatus::Running));
                }
                TaskStatus::Pending => {
                    if task_definition.require_user_review {
                        if let Some(point) = self
                            .services
                            .task_service
                            .open_review_for_task(task.id)
                            .await?
                        {
                            debug!(
                                review_point_id = %point.id,
                                task_execution_id = %task.id,
                                "workflow still waiting on review point"
                            );
                            return Ok(StepOutcome::Suspend(WorkflowStatus::AwaitingUserReview));
                        }
                    }
                    self.services.task_service.execute(task.id).await?
                }
            },
            None => {
                if task_definition.require_user_review {
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
                    return Ok(StepOutcome::Suspend(WorkflowStatus::AwaitingUserReview));
                }

                let inputs = build_inputs(workflow, task_definition);
                let created = self
                    .services
                    .task_service
                    .create(workflow, task_definition, inputs)
                    .await?;
                self.services.task_service.execute(created.id).await?
            }
        };

        self.settle(workflow, definition, task_definition, index, task)
    }

    /// Translate a settled (or suspended) task into the next move.
    fn settle(
        &self,
        workflow: &mut WorkflowExecution,
        definition: &WorkflowDefinition,
        task_definition: &TaskDefinition,
        index: usize,
        task: crate::models::TaskExecution,
    ) -> Result<StepOutcome> {
        match task.status {
            TaskStatus::Completed => {
                workflow.variables.extend(task.outputs.clone());
                let next = match task_definition.next_task_on_success {
                    Some(target) => definition.task_index(target).ok_or_else(|| {
                        WorkflowError::Validation(format!(
                            "next_task_on_success target {target} not in definition '{}'",
                            definition.name
                        ))
                    })?,
                    None => index + 1,
                };
                Ok(StepOutcome::Next(next))
            }
            TaskStatus::Skipped => Ok(StepOutcome::Next(index + 1)),
            TaskStatus::AwaitingRetry => Ok(StepOutcome::Suspend(WorkflowStatus::Running)),
            TaskStatus::Running => Ok(StepOutcome::Suspend(WorkflowStatus::Running)),
            TaskStatus::Failed => {
                workflow.error_message = task.error_message.clone();
                match task_definition.next_task_on_failure {
                    // Error path handler: jump and keep the workflow going
                    Some(target) => {
                        let next = definition.task_index(target).ok_or_else(|| {
                            WorkflowError::Validation(format!(
                                "next_task_on_failure target {target} not in definition '{}'",
                                definition.name
                            ))
                        })?;
                        Ok(StepOutcome::Next(next))
                    }
                    None => Ok(StepOutcome::Finish(WorkflowStatus::Failed)),
                }
            }
            TaskStatus::Cancelled => Ok(StepOutcome::Finish(WorkflowStatus::Cancelled)),
            TaskStatus::Pending => Ok(StepOutcome::Suspend(WorkflowStatus::Running)),
        }
    }

    async fn skip_task(
        &self,
        workflow: &WorkflowExecution,
        task_definition: &TaskDefinition,
        index: usize,
    ) -> Result<StepOutcome> {
        let existing = self
            .services
            .task_service
            .latest_for_definition(workflow.id, task_definition.id)
            .await?;

        // Leave an audit record for the skipped task unless one exists
        if existing.map(|t| t.status.is_terminal()) != Some(true) {
            let created = self
                .services
                .task_service
                .create(workflow, task_definition, HashMap::new())
                .await?;
            self.services.task_service.skip(created.id).await?;
        }

        Ok(StepOutcome::Next(index + 1))
    }

    fn condition_holds(
        &self,
        expr: &str,
        workflow: &WorkflowExecution,
        task_definition: &TaskDefinition,
    ) -> bool {
        let context = ExecutionContext::from_variables(&workflow.variables);
        match expression::evaluate(expr, &context) {
            Ok(holds) => holds,
            Err(e) => {
                warn!(
                    task = %task_definition.name,
                    expression = %expr,
                    error = %e,
                    "condition evaluation failed, skipping task"
                );
                false
            }
        }
    }
}

/// Inputs for a task attempt: variable-substituted configuration merged
/// over the workflow's variables.
pub(crate) fn build_inputs(
    workflow: &WorkflowExecution,
    task_definition: &TaskDefinition,
) -> HashMap<String, String> {
    let context = ExecutionContext::from_variables(&workflow.variables);
    let mut inputs = workflow.variables.clone();
    inputs.extend(context.substitute_map(&task_definition.configuration));
    inputs
}
