//! # Lifecycle Events
//!
//! Typed fire-and-forget notifications for workflow, task and review
//! transitions. Subscribers receive events over a broadcast channel and
//! never block publishers.

pub mod publisher;
pub mod types;

pub use publisher::{EventPublisher, PublishError};
pub use types::{
    OrchestrationEvent, TaskEvent, TaskEventType, UserReviewEvent, UserReviewEventType,
    WorkflowEvent, WorkflowEventType,
};
