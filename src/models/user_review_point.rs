//! # User Review Point Model
//!
//! A suspension marker tying a task execution to a pending human
//! decision. Review points are created when a review-bearing task is
//! reached and are only removed with their owning workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Decision submitted for a review point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Accept the task as completed and continue
    Approve,
    /// Fail the task and take its failure path
    Reject,
    /// Reset the task and re-run the workflow from it
    Restart,
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

/// A pending or completed human review attached to a task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviewPoint {
    pub id: Uuid,
    pub workflow_execution_id: Uuid,
    pub task_execution_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Set when a decision is submitted; null while the point is open
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer: Option<String>,
    pub comment: Option<String>,
    pub decision: Option<ReviewDecision>,
}

impl UserReviewPoint {
    /// Create an open review point for a task execution.
    pub fn new(workflow_execution_id: Uuid, task_execution_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_execution_id,
            task_execution_id,
            created_at: Utc::now(),
            reviewed_at: None,
            reviewer: None,
            comment: None,
            decision: None,
        }
    }

    /// Check if this point still awaits a decision.
    pub fn is_open(&self) -> bool {
        self.reviewed_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_review_point_is_open() {
        let point = UserReviewPoint::new(Uuid::now_v7(), Uuid::now_v7());
        assert!(point.is_open());
        assert!(point.decision.is_none());
    }
}
