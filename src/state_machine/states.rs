use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow execution lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Initial state when the execution record is created
    Created,
    /// A strategy is driving the execution (or a retry/async result is pending)
    Running,
    /// Execution was suspended by an operator
    Paused,
    /// Execution is suspended on an open review point
    AwaitingUserReview,
    /// All tasks finished successfully
    Completed,
    /// Execution failed and exhausted its recovery options
    Failed,
    /// Execution was cancelled by an operator
    Cancelled,
}

impl WorkflowStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if the execution is suspended waiting on an outside actor
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Paused | Self::AwaitingUserReview)
    }

    /// Check if the engine may drive this execution
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::AwaitingUserReview => write!(f, "awaiting_user_review"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "awaiting_user_review" => Ok(Self::AwaitingUserReview),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid workflow status: {s}")),
        }
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::Created
    }
}

/// Task execution lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state when the task record is created
    Pending,
    /// An executor is running the task (or a queued result is pending)
    Running,
    /// Task finished successfully
    Completed,
    /// Task failed with retries exhausted
    Failed,
    /// Task was skipped (condition evaluated false)
    Skipped,
    /// Task was cancelled with its owning workflow
    Cancelled,
    /// Task failed and is scheduled for another attempt
    AwaitingRetry,
}

impl TaskStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Check if the task finished without failing
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Check if the task may be dispatched to an executor
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Pending | Self::AwaitingRetry)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::AwaitingRetry => write!(f, "awaiting_retry"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "cancelled" => Ok(Self::Cancelled),
            "awaiting_retry" => Ok(Self::AwaitingRetry),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}
