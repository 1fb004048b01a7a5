//! Sequential execution: one task at a time in execution order, with
//! success/failure branch targets honored.

use crate::engine::strategy::ordered::OrderedDriver;
use crate::engine::strategy::{ExecutionStrategy, StrategyServices};
use crate::error::Result;
use crate::models::{StrategyType, WorkflowExecution};
use crate::state_machine::WorkflowStatus;
use async_trait::async_trait;
use uuid::Uuid;

/// Drives tasks strictly in `execution_order`.
pub struct SequentialStrategy {
    driver: OrderedDriver,
}

impl SequentialStrategy {
    pub fn new(services: StrategyServices) -> Self {
        Self {
            driver: OrderedDriver::new(services, false),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for SequentialStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Sequential
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
