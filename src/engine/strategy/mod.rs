//! # Execution Strategies
//!
//! A strategy drives a workflow's tasks from `current_task_index` until a
//! terminal workflow status is reached or a suspension condition fires
//! (pending retry, open review point, in-flight queued task). The engine
//! awaits the returned status and persists it.

pub mod conditional;
pub mod ordered;
pub mod parallel;
pub mod sequential;

pub use conditional::ConditionalStrategy;
pub use parallel::ParallelStrategy;
pub use sequential::SequentialStrategy;

use crate::error::Result;
use crate::models::{StrategyType, WorkflowExecution};
use crate::services::{TaskExecutionService, WorkflowExecutionService};
use crate::state_machine::WorkflowStatus;
use crate::storage::WorkflowDefinitionStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Shared collaborators handed to every strategy.
#[derive(Clone)]
pub struct StrategyServices {
    pub workflow_service: Arc<WorkflowExecutionService>,
    pub task_service: Arc<TaskExecutionService>,
    pub definitions: Arc<dyn WorkflowDefinitionStore>,
    /// Bound on concurrently dispatched tasks (parallel strategy)
    pub thread_pool_size: usize,
}

/// Policy deciding order, parallelism and branching of task executions.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Strategy type this implementation serves.
    fn strategy_type(&self) -> StrategyType;

    /// Drive the workflow from its current task index and report the
    /// resulting workflow status.
    async fn execute(&self, workflow: &WorkflowExecution) -> Result<WorkflowStatus>;

    /// Drive only the tasks whose definition ids are listed, preserving
    /// their execution order and ignoring review gates. An empty list
    /// completes immediately.
    async fn execute_subset(
        &self,
        workflow: &WorkflowExecution,
        task_definition_ids: Vec<Uuid>,
    ) -> Result<WorkflowStatus>;
}

/// Build the standard strategy map used by the engine, keyed by each
/// strategy's declared type.
pub fn default_strategies(
    services: StrategyServices,
) -> HashMap<StrategyType, Arc<dyn ExecutionStrategy>> {
    let strategies: Vec<Arc<dyn ExecutionStrategy>> = vec![
        Arc::new(SequentialStrategy::new(services.clone())),
        Arc::new(ParallelStrategy::new(services.clone())),
        Arc::new(ConditionalStrategy::new(services)),
    ];
    strategies
        .into_iter()
        .map(|strategy| (strategy.strategy_type(), strategy))
        .collect()
}
