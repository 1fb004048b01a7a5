//! # Domain Models
//!
//! Definitions (templates), executions (runs) and review points. Child
//! records reference their parents by id; the stores fetch children on
//! demand rather than holding live object graphs.

pub mod task_execution;
pub mod user_review_point;
pub mod workflow_definition;
pub mod workflow_execution;

pub use task_execution::TaskExecution;
pub use user_review_point::{ReviewDecision, UserReviewPoint};
pub use workflow_definition::{ExecutionMode, StrategyType, TaskDefinition, WorkflowDefinition};
pub use workflow_execution::WorkflowExecution;
