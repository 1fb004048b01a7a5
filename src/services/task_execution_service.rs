//! # Task Execution Service
//!
//! Owns the task lifecycle: creation, dispatch to local executors or the
//! task queue, completion, failure with retry scheduling, skipping and
//! cancellation. Every transition is validated against the task state
//! machine, persisted, and announced on the event bus.

use crate::context::ExecutionContext;
use crate::error::{Result, WorkflowError};
use crate::events::{
    EventPublisher, OrchestrationEvent, TaskEvent, TaskEventType, UserReviewEvent,
    UserReviewEventType,
};
use crate::executor::ExecutorError;
use crate::messaging::{TaskDispatchMessage, TaskMessageSender};
use crate::models::{
    ExecutionMode, TaskDefinition, TaskExecution, UserReviewPoint, WorkflowExecution,
};
use crate::registry::TaskExecutorRegistry;
use crate::retry::RetryPolicy;
use crate::state_machine::{task_state_machine, TaskSignal, WorkflowStatus};
use crate::storage::{
    ReviewPointStore, TaskExecutionStore, WorkflowDefinitionStore, WorkflowExecutionStore,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Service managing task executions.
pub struct TaskExecutionService {
    tasks: Arc<dyn TaskExecutionStore>,
    executions: Arc<dyn WorkflowExecutionStore>,
    definitions: Arc<dyn WorkflowDefinitionStore>,
    review_points: Arc<dyn ReviewPointStore>,
    registry: Arc<TaskExecutorRegistry>,
    sender: Arc<dyn TaskMessageSender>,
    events: EventPublisher,
    retry_policy: RetryPolicy,
}

impl TaskExecutionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskExecutionStore>,
        executions: Arc<dyn WorkflowExecutionStore>,
        definitions: Arc<dyn WorkflowDefinitionStore>,
        review_points: Arc<dyn ReviewPointStore>,
        registry: Arc<TaskExecutorRegistry>,
        sender: Arc<dyn TaskMessageSender>,
        events: EventPublisher,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            tasks,
            executions,
            definitions,
            review_points,
            registry,
            sender,
            events,
            retry_policy,
        }
    }

    /// Create a new task execution for a running workflow.
    pub async fn create(
        &self,
        workflow: &WorkflowExecution,
        definition: &TaskDefinition,
        inputs: HashMap<String, String>,
    ) -> Result<TaskExecution> {
        if workflow.status != WorkflowStatus::Running {
            return Err(WorkflowError::Validation(format!(
                "cannot create task for workflow {} in status {}",
                workflow.id, workflow.status
            )));
        }

        let task = self
            .tasks
            .insert(TaskExecution::new(workflow.id, definition, inputs))
            .await?;

        self.publish_task_event(
            &task,
            &definition.name,
            &workflow.correlation_id,
            TaskEventType::Created,
        );
        Ok(task)
    }

    /// Dispatch a task to its executor or the task queue.
    ///
    /// Local tasks run to a terminal-or-retry outcome before this
    /// returns; queued tasks are left `Running` until their result
    /// arrives through the ingress.
    pub async fn execute(&self, task_execution_id: Uuid) -> Result<TaskExecution> {
        let mut task = self.tasks.get(task_execution_id).await?;
        let (workflow, definition) = self.load_definition(&task).await?;

        if !task.status.is_dispatchable() {
            return Err(WorkflowError::Validation(format!(
                "task {} cannot be executed in status {}",
                task.id, task.status
            )));
        }

        task.status = task_state_machine::target_status(task.status, &TaskSignal::Start)?;
        task.started_at = Some(Utc::now());
        task.next_retry_at = None;
        task = self.tasks.update(task).await?;
        self.publish_task_event(
            &task,
            &definition.name,
            &workflow.correlation_id,
            TaskEventType::Started,
        );

        match task.execution_mode {
            ExecutionMode::Queued => self.dispatch_queued(task, &definition).await,
            ExecutionMode::Local => self.run_local(task, &workflow, &definition).await,
        }
    }

    /// Complete a task with its outputs.
    ///
    /// Tasks already in a terminal status (for example cancelled with
    /// their workflow) discard the result: no transition, no event.
    pub async fn complete(
        &self,
        task_execution_id: Uuid,
        outputs: HashMap<String, String>,
    ) -> Result<TaskExecution> {
        let mut task = self.tasks.get(task_execution_id).await?;
        if task.status.is_terminal() {
            debug!(
                task_execution_id = %task.id,
                status = %task.status,
                "discarding completion for settled task"
            );
            return Ok(task);
        }

        let (definition_name, correlation_id) = self.event_context(&task).await;
        task.status = task_state_machine::target_status(task.status, &TaskSignal::Complete)?;
        task.completed_at = Some(Utc::now());
        task.outputs.extend(outputs);
        task = self.tasks.update(task).await?;

        self.publish_task_event(&task, &definition_name, &correlation_id, TaskEventType::Completed);
        Ok(task)
    }

    /// Record a task failure, scheduling a retry while budget remains.
    ///
    /// Tasks already in a terminal status discard the report (late
    /// failures from cancelled workflows or stale queue replays).
    pub async fn fail(
        &self,
        task_execution_id: Uuid,
        error_message: impl Into<String>,
    ) -> Result<TaskExecution> {
        self.fail_inner(task_execution_id, error_message.into(), false)
            .await
    }

    /// Record a terminal task failure, bypassing the retry budget.
    /// Used for configuration errors, which retries cannot fix.
    pub async fn fail_terminal(
        &self,
        task_execution_id: Uuid,
        error_message: impl Into<String>,
    ) -> Result<TaskExecution> {
        self.fail_inner(task_execution_id, error_message.into(), true)
            .await
    }

    async fn fail_inner(
        &self,
        task_execution_id: Uuid,
        error_message: String,
        terminal: bool,
    ) -> Result<TaskExecution> {
        let mut task = self.tasks.get(task_execution_id).await?;
        if task.status.is_terminal() {
            debug!(
                task_execution_id = %task.id,
                status = %task.status,
                "discarding failure report for settled task"
            );
            return Ok(task);
        }

        let (workflow, definition) = self.load_definition(&task).await?;
        task.error_message = Some(error_message);

        if !terminal && task.retry_count < definition.retry_limit {
            let attempt = task.retry_count;
            task.status =
                task_state_machine::target_status(task.status, &TaskSignal::ScheduleRetry)?;
            task.retry_count += 1;
            task.next_retry_at = Some(self.retry_policy.next_retry_at(attempt, Utc::now()));
            task = self.tasks.update(task).await?;
            self.publish_task_event(
                &task,
                &definition.name,
                &workflow.correlation_id,
                TaskEventType::RetryScheduled,
            );
        } else {
            task.status = task_state_machine::target_status(task.status, &TaskSignal::Fail)?;
            task.completed_at = Some(Utc::now());
            task = self.tasks.update(task).await?;
            self.publish_task_event(
                &task,
                &definition.name,
                &workflow.correlation_id,
                TaskEventType::Failed,
            );
        }

        Ok(task)
    }

    /// Skip a pending task (condition evaluated false).
    pub async fn skip(&self, task_execution_id: Uuid) -> Result<TaskExecution> {
        let mut task = self.tasks.get(task_execution_id).await?;
        let (definition_name, correlation_id) = self.event_context(&task).await;

        task.status = task_state_machine::target_status(task.status, &TaskSignal::Skip)?;
        task.completed_at = Some(Utc::now());
        task = self.tasks.update(task).await?;

        self.publish_task_event(&task, &definition_name, &correlation_id, TaskEventType::Skipped);
        Ok(task)
    }

    /// Persist changes made by a caller that owns the task record.
    pub async fn save(&self, task: TaskExecution) -> Result<TaskExecution> {
        self.tasks.update(task).await
    }

    pub async fn get(&self, task_execution_id: Uuid) -> Result<TaskExecution> {
        self.tasks.get(task_execution_id).await
    }

    /// Tasks of a workflow ordered by their definition's execution order,
    /// then creation time.
    pub async fn list_for_workflow(&self, workflow_execution_id: Uuid) -> Result<Vec<TaskExecution>> {
        let workflow = self.executions.get(workflow_execution_id).await?;
        let definition = self.definitions.get(workflow.workflow_definition_id).await?;
        let mut tasks = self.tasks.list_for_workflow(workflow_execution_id).await?;
        tasks.sort_by_key(|t| {
            (
                definition.task_index(t.task_definition_id).unwrap_or(usize::MAX),
                t.created_at,
            )
        });
        Ok(tasks)
    }

    /// Most recent task execution for one task definition, if any.
    pub async fn latest_for_definition(
        &self,
        workflow_execution_id: Uuid,
        task_definition_id: Uuid,
    ) -> Result<Option<TaskExecution>> {
        let tasks = self.tasks.list_for_workflow(workflow_execution_id).await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.task_definition_id == task_definition_id)
            .max_by_key(|t| t.created_at))
    }

    /// Tasks awaiting retry whose due time has passed.
    pub async fn tasks_to_retry(&self, now: chrono::DateTime<Utc>) -> Result<Vec<TaskExecution>> {
        self.tasks.find_due_for_retry(now).await
    }

    /// Cancel every non-terminal task of a workflow. Results that arrive
    /// later for these tasks are discarded by `complete` / `fail`.
    pub async fn cancel_tasks_for_workflow(&self, workflow_execution_id: Uuid) -> Result<()> {
        let tasks = self.tasks.list_for_workflow(workflow_execution_id).await?;
        for mut task in tasks {
            if task.status.is_terminal() {
                continue;
            }
            task.status = task_state_machine::target_status(task.status, &TaskSignal::Cancel)?;
            task.completed_at = Some(Utc::now());
            self.tasks.update(task).await?;
        }
        Ok(())
    }

    /// The open review point attached to a task, if any.
    pub async fn open_review_for_task(
        &self,
        task_execution_id: Uuid,
    ) -> Result<Option<UserReviewPoint>> {
        let task = self.tasks.get(task_execution_id).await?;
        let points = self
            .review_points
            .list_for_workflow(task.workflow_execution_id)
            .await?;
        Ok(points
            .into_iter()
            .find(|p| p.task_execution_id == task_execution_id && p.is_open()))
    }

    /// Register an open review point for a task and announce it.
    pub async fn create_review_point(&self, task_execution_id: Uuid) -> Result<UserReviewPoint> {
        let task = self.tasks.get(task_execution_id).await?;
        let workflow = self.executions.get(task.workflow_execution_id).await?;
        let point = self
            .review_points
            .insert(UserReviewPoint::new(task.workflow_execution_id, task.id))
            .await?;

        self.events
            .publish(OrchestrationEvent::UserReview(UserReviewEvent {
                event_type: UserReviewEventType::Requested,
                workflow_execution_id: point.workflow_execution_id,
                task_execution_id: point.task_execution_id,
                review_point_id: point.id,
                correlation_id: workflow.correlation_id,
                occurred_at: Utc::now(),
                attributes: HashMap::new(),
            }));

        Ok(point)
    }

    async fn dispatch_queued(
        &self,
        task: TaskExecution,
        definition: &TaskDefinition,
    ) -> Result<TaskExecution> {
        let message = TaskDispatchMessage {
            task_execution_id: task.id,
            task_type: definition.task_type.clone(),
            inputs: task.inputs.clone(),
            configuration: definition.configuration.clone(),
        };

        match self.sender.send_task_message(message).await {
            // The task stays Running; its result arrives asynchronously
            Ok(()) => Ok(task),
            Err(e) => {
                error!(task_execution_id = %task.id, error = %e, "task dispatch failed");
                self.fail(task.id, e.to_string()).await
            }
        }
    }

    async fn run_local(
        &self,
        task: TaskExecution,
        workflow: &WorkflowExecution,
        definition: &TaskDefinition,
    ) -> Result<TaskExecution> {
        let executor = match self.registry.resolve(&definition.task_type) {
            Ok(executor) => executor,
            Err(e @ WorkflowError::NoExecutor(_)) => {
                // Leave a clear terminal failure behind before surfacing
                self.fail_terminal(task.id, e.to_string()).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let mut context = ExecutionContext::from_variables(&workflow.variables);
        for (key, value) in &task.inputs {
            context.set_variable(key.clone(), Value::String(value.clone()));
        }

        let invocation = executor.execute(definition, &mut context);
        let outcome = match definition.timeout_seconds {
            Some(seconds) => {
                match tokio::time::timeout(Duration::from_secs(seconds), invocation).await {
                    Ok(result) => result,
                    Err(_) => Err(ExecutorError::Retriable(format!(
                        "task timed out after {seconds}s"
                    ))),
                }
            }
            None => invocation.await,
        };

        match outcome {
            Ok(result) => {
                let outputs = stringify_outputs(result);
                self.complete(task.id, outputs).await
            }
            Err(ExecutorError::Configuration(message)) => {
                warn!(task_execution_id = %task.id, error = %message, "task configuration error");
                self.fail_terminal(task.id, message).await
            }
            Err(ExecutorError::Retriable(message)) => self.fail(task.id, message).await,
        }
    }

    async fn load_definition(
        &self,
        task: &TaskExecution,
    ) -> Result<(WorkflowExecution, TaskDefinition)> {
        let workflow = self.executions.get(task.workflow_execution_id).await?;
        let definition = self.definitions.get(workflow.workflow_definition_id).await?;
        let task_definition = definition
            .task_by_id(task.task_definition_id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("task definition", task.task_definition_id))?;
        Ok((workflow, task_definition))
    }

    /// Task name and correlation id for event payloads; blank when the
    /// surrounding records are already gone.
    async fn event_context(&self, task: &TaskExecution) -> (String, String) {
        match self.load_definition(task).await {
            Ok((workflow, definition)) => (definition.name, workflow.correlation_id),
            Err(_) => (String::new(), String::new()),
        }
    }

    fn publish_task_event(
        &self,
        task: &TaskExecution,
        task_name: &str,
        correlation_id: &str,
        event_type: TaskEventType,
    ) {
        let mut attributes = HashMap::new();
        attributes.insert("status".to_string(), Value::String(task.status.to_string()));
        if let Some(error) = &task.error_message {
            attributes.insert("error_message".to_string(), Value::String(error.clone()));
        }
        if let Some(due) = task.next_retry_at {
            attributes.insert(
                "next_retry_at".to_string(),
                Value::String(due.to_rfc3339()),
            );
        }

        self.events.publish(OrchestrationEvent::Task(TaskEvent {
            event_type,
            workflow_execution_id: task.workflow_execution_id,
            task_execution_id: task.id,
            task_name: task_name.to_string(),
            correlation_id: correlation_id.to_string(),
            occurred_at: Utc::now(),
            attributes,
        }));
    }
}

/// Flatten an executor result map to string outputs for storage.
fn stringify_outputs(result: HashMap<String, Value>) -> HashMap<String, String> {
    result
        .into_iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, rendered)
        })
        .collect()
}
