//! # Workflow Definition Model
//!
//! A named, versioned workflow template: an ordered list of task
//! definitions plus the strategy that drives them. Definitions are
//! immutable after creation; changes register a new version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Strategy used to drive a workflow's tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// One task at a time, in execution order
    Sequential,
    /// All tasks dispatched concurrently
    Parallel,
    /// Sequential with per-task condition gates
    Conditional,
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
            Self::Conditional => write!(f, "conditional"),
        }
    }
}

impl std::str::FromStr for StrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "conditional" => Ok(Self::Conditional),
            _ => Err(format!("Invalid strategy type: {s}")),
        }
    }
}

/// How a task execution reaches its executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Invoke a registered executor in-process
    Local,
    /// Publish a dispatch message and await an asynchronous result
    Queued,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Queued => write!(f, "queued"),
        }
    }
}

/// One task template inside a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: Uuid,
    pub name: String,
    /// Executor selector, resolved through the registry
    pub task_type: String,
    /// Position within the workflow; strictly ordered for sequential runs
    pub execution_order: i32,
    pub retry_limit: u32,
    /// Bound on a single executor invocation, when set
    pub timeout_seconds: Option<u64>,
    pub execution_mode: ExecutionMode,
    /// Suspend the workflow for a human decision before running this task
    pub require_user_review: bool,
    /// Boolean expression over context variables gating execution
    pub conditional_expression: Option<String>,
    /// Branch target taken after success, overriding order
    pub next_task_on_success: Option<Uuid>,
    /// Branch target taken after terminal failure (error path handler)
    pub next_task_on_failure: Option<Uuid>,
    /// Executor configuration; values support `${var}` substitution
    pub configuration: HashMap<String, String>,
}

impl TaskDefinition {
    /// Create a minimal local task definition for the given type.
    pub fn new(name: impl Into<String>, task_type: impl Into<String>, execution_order: i32) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            task_type: task_type.into(),
            execution_order,
            retry_limit: 0,
            timeout_seconds: None,
            execution_mode: ExecutionMode::Local,
            require_user_review: false,
            conditional_expression: None,
            next_task_on_success: None,
            next_task_on_failure: None,
            configuration: HashMap::new(),
        }
    }
}

/// A named, versioned workflow template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub strategy_type: StrategyType,
    /// Task definitions, kept sorted by `execution_order`
    pub tasks: Vec<TaskDefinition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Create a definition, sorting its tasks by execution order.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        strategy_type: StrategyType,
        mut tasks: Vec<TaskDefinition>,
    ) -> Self {
        tasks.sort_by_key(|t| t.execution_order);
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: None,
            version: version.into(),
            strategy_type,
            tasks,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find a task definition by id.
    pub fn task_by_id(&self, task_definition_id: Uuid) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.id == task_definition_id)
    }

    /// Position of a task definition within the ordered list.
    pub fn task_index(&self, task_definition_id: Uuid) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_definition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_are_sorted_by_execution_order() {
        let def = WorkflowDefinition::new(
            "order-flow",
            "1.0.0",
            StrategyType::Sequential,
            vec![
                TaskDefinition::new("second", "http", 1),
                TaskDefinition::new("first", "http", 0),
            ],
        );
        assert_eq!(def.tasks[0].name, "first");
        assert_eq!(def.tasks[1].name, "second");
    }

    #[test]
    fn task_lookup_by_id() {
        let task = TaskDefinition::new("only", "http", 0);
        let task_id = task.id;
        let def = WorkflowDefinition::new("flow", "1.0.0", StrategyType::Sequential, vec![task]);
        assert_eq!(def.task_by_id(task_id).unwrap().name, "only");
        assert_eq!(def.task_index(task_id), Some(0));
        assert!(def.task_by_id(Uuid::now_v7()).is_none());
    }

    #[test]
    fn strategy_type_round_trip() {
        assert_eq!(StrategyType::Conditional.to_string(), "conditional");
        assert_eq!(
            "parallel".parse::<StrategyType>().unwrap(),
            StrategyType::Parallel
        );
        assert!("graph".parse::<StrategyType>().is_err());
    }
}
