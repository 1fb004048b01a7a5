//! # Lifecycle State Machines
//!
//! Status enums and legal-transition tables for workflow executions and
//! task executions. The services consult these before persisting any
//! status change; terminal statuses are absorbing.

pub mod states;
pub mod task_state_machine;
pub mod workflow_state_machine;

pub use states::{TaskStatus, WorkflowStatus};
pub use task_state_machine::TaskSignal;

/// Errors raised when a lifecycle transition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// The requested transition is not in the legal-transition table
    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// The entity is in a terminal state; no transition may leave it
    #[error("state '{state}' is terminal and cannot transition")]
    TerminalState { state: String },
}
