//! # Workflow Execution Service
//!
//! Owns the workflow lifecycle: creation from a definition, status
//! transitions (validated against the state machine), operator controls
//! (pause / resume / cancel / retry), lookup queries and terminal-state
//! cleanup with cascade deletion.

use crate::engine::WorkflowEngine;
use crate::error::{Result, WorkflowError};
use crate::events::{EventPublisher, OrchestrationEvent, WorkflowEvent, WorkflowEventType};
use crate::models::{WorkflowDefinition, WorkflowExecution};
use crate::state_machine::{task_state_machine, workflow_state_machine, TaskSignal, WorkflowStatus};
use crate::storage::{
    ReviewPointStore, TaskExecutionStore, WorkflowDefinitionStore, WorkflowExecutionStore,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info};
use uuid::Uuid;

/// Service managing workflow executions.
pub struct WorkflowExecutionService {
    executions: Arc<dyn WorkflowExecutionStore>,
    definitions: Arc<dyn WorkflowDefinitionStore>,
    tasks: Arc<dyn TaskExecutionStore>,
    review_points: Arc<dyn ReviewPointStore>,
    events: EventPublisher,
    /// Late-bound engine handle for operations that re-enter the drive
    /// loop; the engine itself holds this service
    engine: OnceLock<Weak<WorkflowEngine>>,
}

impl WorkflowExecutionService {
    pub fn new(
        executions: Arc<dyn WorkflowExecutionStore>,
        definitions: Arc<dyn WorkflowDefinitionStore>,
        tasks: Arc<dyn TaskExecutionStore>,
        review_points: Arc<dyn ReviewPointStore>,
        events: EventPublisher,
    ) -> Self {
        Self {
            executions,
            definitions,
            tasks,
            review_points,
            events,
            engine: OnceLock::new(),
        }
    }

    /// Attach the engine after assembly. Only the first call wins.
    pub fn attach_engine(&self, engine: &Arc<WorkflowEngine>) {
        let _ = self.engine.set(Arc::downgrade(engine));
    }

    fn engine(&self) -> Result<Arc<WorkflowEngine>> {
        self.engine
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                WorkflowError::Configuration("workflow engine not attached".to_string())
            })
    }

    /// Create a new execution of the named definition version.
    ///
    /// The supplied correlation id must be unique across executions; a
    /// fresh one is generated when absent.
    pub async fn start_workflow(
        &self,
        definition_name: &str,
        version: &str,
        variables: HashMap<String, String>,
        correlation_id: Option<String>,
    ) -> Result<WorkflowExecution> {
        let definition = self
            .definitions
            .find_by_name_and_version(definition_name, version)
            .await?
            .ok_or_else(|| {
                WorkflowError::not_found(
                    "workflow definition",
                    format!("{definition_name}/{version}"),
                )
            })?;

        let mut execution = WorkflowExecution::new(definition.id, correlation_id, variables);
        execution.started_at = Some(Utc::now());
        let execution = self.executions.insert(execution).await?;

        info!(
            workflow_execution_id = %execution.id,
            definition = %definition_name,
            version = %version,
            correlation_id = %execution.correlation_id,
            "workflow execution created"
        );
        self.publish_workflow_event(&execution, &definition, WorkflowEventType::Created);

        Ok(execution)
    }

    pub async fn get(&self, workflow_execution_id: Uuid) -> Result<WorkflowExecution> {
        self.executions.get(workflow_execution_id).await
    }

    pub async fn get_by_correlation_id(&self, correlation_id: &str) -> Result<WorkflowExecution> {
        self.executions
            .find_by_correlation_id(correlation_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("workflow execution", correlation_id))
    }

    pub async fn list_by_status(&self, status: WorkflowStatus) -> Result<Vec<WorkflowExecution>> {
        self.executions.find_by_status(status).await
    }

    /// Move an execution to a new status.
    ///
    /// Validates against the state machine, stamps `completed_at` exactly
    /// when the new status is terminal, persists and publishes a
    /// `StatusChanged` event.
    pub async fn update_status(
        &self,
        workflow_execution_id: Uuid,
        status: WorkflowStatus,
    ) -> Result<WorkflowExecution> {
        let mut execution = self.executions.get(workflow_execution_id).await?;
        let previous = execution.status;
        workflow_state_machine::validate_transition(previous, status)?;

        if previous == status {
            return Ok(execution);
        }

        execution.status = status;
        execution.completed_at = status.is_terminal().then(Utc::now);
        let execution = self.executions.update(execution).await?;

        debug!(
            workflow_execution_id = %execution.id,
            from = %previous,
            to = %status,
            "workflow status changed"
        );

        let definition = self.definitions.get(execution.workflow_definition_id).await?;
        let mut attributes = HashMap::new();
        attributes.insert(
            "previous_status".to_string(),
            Value::String(previous.to_string()),
        );
        attributes.insert("status".to_string(), Value::String(status.to_string()));
        self.publish_workflow_event_with(
            &execution,
            &definition,
            WorkflowEventType::StatusChanged,
            attributes,
        );

        Ok(execution)
    }

    /// Persist caller-made changes (variables, current index, error).
    pub async fn save(&self, execution: WorkflowExecution) -> Result<WorkflowExecution> {
        self.executions.update(execution).await
    }

    /// Pause a running execution.
    pub async fn pause(&self, workflow_execution_id: Uuid) -> Result<WorkflowExecution> {
        let execution = self
            .update_status(workflow_execution_id, WorkflowStatus::Paused)
            .await?;
        let definition = self.definitions.get(execution.workflow_definition_id).await?;
        self.publish_workflow_event(&execution, &definition, WorkflowEventType::Paused);
        Ok(execution)
    }

    /// Resume a paused execution. The caller re-enters the engine.
    pub async fn resume(&self, workflow_execution_id: Uuid) -> Result<WorkflowExecution> {
        let current = self.executions.get(workflow_execution_id).await?;
        if current.status != WorkflowStatus::Paused {
            return Err(WorkflowError::State(
                crate::state_machine::StateMachineError::InvalidTransition {
                    from: current.status.to_string(),
                    to: WorkflowStatus::Running.to_string(),
                },
            ));
        }
        let execution = self
            .update_status(workflow_execution_id, WorkflowStatus::Running)
            .await?;
        let definition = self.definitions.get(execution.workflow_definition_id).await?;
        self.publish_workflow_event(&execution, &definition, WorkflowEventType::Resumed);
        Ok(execution)
    }

    /// Cancel an execution immediately and cancel all its open tasks.
    ///
    /// In-flight work is allowed to finish; its later results are
    /// discarded because the tasks are already settled.
    pub async fn cancel(&self, workflow_execution_id: Uuid) -> Result<WorkflowExecution> {
        let execution = self
            .update_status(workflow_execution_id, WorkflowStatus::Cancelled)
            .await?;

        let tasks = self.tasks.list_for_workflow(workflow_execution_id).await?;
        for mut task in tasks {
            if task.status.is_terminal() {
                continue;
            }
            task.status = task_state_machine::target_status(task.status, &TaskSignal::Cancel)?;
            task.completed_at = Some(Utc::now());
            self.tasks.update(task).await?;
        }

        let definition = self.definitions.get(execution.workflow_definition_id).await?;
        self.publish_workflow_event(&execution, &definition, WorkflowEventType::Cancelled);
        Ok(execution)
    }

    /// Re-open a failed execution for another run. The caller re-enters
    /// the engine.
    pub async fn retry(&self, workflow_execution_id: Uuid) -> Result<WorkflowExecution> {
        let current = self.executions.get(workflow_execution_id).await?;
        if current.status != WorkflowStatus::Failed {
            return Err(WorkflowError::State(
                crate::state_machine::StateMachineError::InvalidTransition {
                    from: current.status.to_string(),
                    to: WorkflowStatus::Running.to_string(),
                },
            ));
        }

        let mut execution = self
            .update_status(workflow_execution_id, WorkflowStatus::Running)
            .await?;
        execution.retry_count += 1;
        execution.error_message = None;
        execution.completed_at = None;
        let execution = self.executions.update(execution).await?;

        // Failed tasks get a fresh attempt on the next drive
        let tasks = self.tasks.list_for_workflow(workflow_execution_id).await?;
        for mut task in tasks {
            if task.status == crate::state_machine::TaskStatus::Failed {
                task.reset_for_rerun();
                self.tasks.update(task).await?;
            }
        }

        let definition = self.definitions.get(execution.workflow_definition_id).await?;
        self.publish_workflow_event(&execution, &definition, WorkflowEventType::Retry);
        Ok(execution)
    }

    /// Re-open a paused or failed execution and re-run only the listed
    /// task definitions.
    ///
    /// The workflow-level retry count is incremented; the chosen tasks
    /// keep their own retry counts.
    pub async fn retry_subset(
        &self,
        workflow_execution_id: Uuid,
        task_definition_ids: Vec<Uuid>,
    ) -> Result<WorkflowExecution> {
        let current = self.executions.get(workflow_execution_id).await?;
        if current.status != WorkflowStatus::Failed && current.status != WorkflowStatus::Paused {
            return Err(WorkflowError::State(
                crate::state_machine::StateMachineError::InvalidTransition {
                    from: current.status.to_string(),
                    to: WorkflowStatus::Running.to_string(),
                },
            ));
        }

        let mut execution = self
            .update_status(workflow_execution_id, WorkflowStatus::Running)
            .await?;
        execution.retry_count += 1;
        execution.error_message = None;
        let execution = self.executions.update(execution).await?;

        let definition = self.definitions.get(execution.workflow_definition_id).await?;
        self.publish_workflow_event(&execution, &definition, WorkflowEventType::Retry);

        self.engine()?
            .execute_task_subset(workflow_execution_id, task_definition_ids)
            .await?;

        self.executions.get(workflow_execution_id).await
    }

    /// Delete a terminal execution with its tasks and review points.
    pub async fn delete(&self, workflow_execution_id: Uuid) -> Result<()> {
        let execution = self.executions.get(workflow_execution_id).await?;
        if !execution.status.is_terminal() {
            return Err(WorkflowError::State(
                crate::state_machine::StateMachineError::InvalidTransition {
                    from: execution.status.to_string(),
                    to: "deleted".to_string(),
                },
            ));
        }

        self.review_points
            .delete_for_workflow(workflow_execution_id)
            .await?;
        self.tasks.delete_for_workflow(workflow_execution_id).await?;
        self.executions.delete(workflow_execution_id).await?;

        info!(workflow_execution_id = %workflow_execution_id, "workflow execution deleted");
        Ok(())
    }

    /// Terminal executions completed before the cutoff, for retention
    /// cleanup.
    pub async fn find_completed_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkflowExecution>> {
        self.executions.find_completed_before(cutoff).await
    }

    /// Paused executions started before the cutoff, for stuck-workflow
    /// monitoring.
    pub async fn find_paused_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkflowExecution>> {
        self.executions.find_paused_before(cutoff).await
    }

    fn publish_workflow_event(
        &self,
        execution: &WorkflowExecution,
        definition: &WorkflowDefinition,
        event_type: WorkflowEventType,
    ) {
        self.publish_workflow_event_with(execution, definition, event_type, HashMap::new());
    }

    fn publish_workflow_event_with(
        &self,
        execution: &WorkflowExecution,
        definition: &WorkflowDefinition,
        event_type: WorkflowEventType,
        mut attributes: HashMap<String, Value>,
    ) {
        attributes.insert(
            "definition_version".to_string(),
            Value::String(definition.version.clone()),
        );
        if let Some(error) = &execution.error_message {
            attributes.insert("error_message".to_string(), Value::String(error.clone()));
        }

        self.events
            .publish(OrchestrationEvent::Workflow(WorkflowEvent {
                event_type,
                workflow_execution_id: execution.id,
                workflow_name: definition.name.clone(),
                correlation_id: execution.correlation_id.clone(),
                occurred_at: Utc::now(),
                attributes,
            }));
    }
}
