//! Conditional execution: sequential driving with per-task boolean
//! condition gates evaluated against the execution context. Tasks whose
//! condition evaluates false are skipped.

use crate::engine::strategy::ordered::OrderedDriver;
use crate::engine::strategy::{ExecutionStrategy, StrategyServices};
use crate::error::Result;
use crate::models::{StrategyType, WorkflowExecution};
use crate::state_machine::WorkflowStatus;
use async_trait::async_trait;
use uuid::Uuid;

/// Sequential driving with condition gates.
pub struct ConditionalStrategy {
    driver: OrderedDriver,
}

impl ConditionalStrategy {
    pub fn new(services: StrategyServices) -> Self {
        Self {
            driver: OrderedDriver::new(services, true),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for ConditionalStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Conditional
    }

    async fn execute(&self, workflow: &WorkflowExecution) -> Result<WorkflowStatus> {
        self.driver.drive(workflow.id).await
    }

    async fn execute_subset(
        &self,
        workflow: &WorkflowExecution,
        task_definition_ids: Vec<Uuid>,
    ) -> Result<WorkflowStatus> {
        self.driver.drive_subset(workflow.id, task_definition_ids).await
    }
}
