use super::{StateMachineError, WorkflowStatus};

/// Validate a status write, as performed by `update_status`.
///
/// Terminal statuses are absorbing; everything else must appear in the
/// legal-transition table. Failed -> Running (operator retry) is the
/// only exit from a terminal status.
pub fn validate_transition(
    from: WorkflowStatus,
    to: WorkflowStatus,
) -> Result<(), StateMachineError> {
    if from == to {
        return Ok(());
    }

    let legal = matches!(
        (from, to),
        (WorkflowStatus::Created, WorkflowStatus::Running)
            | (WorkflowStatus::Created, WorkflowStatus::Cancelled)
            | (WorkflowStatus::Running, WorkflowStatus::Completed)
            | (WorkflowStatus::Running, WorkflowStatus::Failed)
            | (WorkflowStatus::Running, WorkflowStatus::Cancelled)
            | (WorkflowStatus::Running, WorkflowStatus::Paused)
            | (WorkflowStatus::Running, WorkflowStatus::AwaitingUserReview)
            | (WorkflowStatus::Paused, WorkflowStatus::Running)
            | (WorkflowStatus::Paused, WorkflowStatus::Cancelled)
            | (WorkflowStatus::AwaitingUserReview, WorkflowStatus::Running)
            | (WorkflowStatus::AwaitingUserReview, WorkflowStatus::Cancelled)
            | (WorkflowStatus::Failed, WorkflowStatus::Running)
    );

    if legal {
        Ok(())
    } else if from.is_terminal() {
        Err(StateMachineError::TerminalState {
            state: from.to_string(),
        })
    } else {
        Err(StateMachineError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
