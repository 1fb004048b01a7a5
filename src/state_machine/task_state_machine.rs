use super::{StateMachineError, TaskStatus};

/// Intent signals that move a task execution through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSignal {
    /// Dispatch the task to an executor
    Start,
    /// Executor finished successfully
    Complete,
    /// Executor failed with retries remaining
    ScheduleRetry,
    /// Executor failed with retries exhausted
    Fail,
    /// Condition evaluated false
    Skip,
    /// Owning workflow was cancelled
    Cancel,
    /// Operator reset the task for re-execution
    Reset,
}

/// Determine the target status for a signal, rejecting illegal moves.
pub fn target_status(
    current: TaskStatus,
    signal: &TaskSignal,
) -> Result<TaskStatus, StateMachineError> {
    let target = match (current, signal) {
        (TaskStatus::Pending, TaskSignal::Start) => TaskStatus::Running,
        (TaskStatus::AwaitingRetry, TaskSignal::Start) => TaskStatus::Running,

        (TaskStatus::Running, TaskSignal::Complete) => TaskStatus::Completed,
        (TaskStatus::Running, TaskSignal::ScheduleRetry) => TaskStatus::AwaitingRetry,
        (TaskStatus::Running, TaskSignal::Fail) => TaskStatus::Failed,

        // Review decisions settle tasks that never started
        (TaskStatus::Pending, TaskSignal::Complete) => TaskStatus::Completed,
        (TaskStatus::Pending, TaskSignal::ScheduleRetry) => TaskStatus::AwaitingRetry,
        (TaskStatus::Pending, TaskSignal::Fail) => TaskStatus::Failed,

        (TaskStatus::Pending, TaskSignal::Skip) => TaskStatus::Skipped,

        // Operator reset (task restart) returns the task to Pending from
        // any state except Cancelled
        (from, TaskSignal::Reset) if from != TaskStatus::Cancelled => TaskStatus::Pending,

        // Cancellation is accepted from any non-terminal state
        (from, TaskSignal::Cancel) if !from.is_terminal() => TaskStatus::Cancelled,

        (from, _) => {
            return Err(StateMachineError::InvalidTransition {
                from: from.to_string(),
                to: format!("{signal:?}"),
            })
        }
    };

    Ok(target)
}
