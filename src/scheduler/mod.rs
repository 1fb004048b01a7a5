//! # Scheduling
//!
//! Recurring background work: re-dispatching due retries, reporting
//! stuck workflows and purging old terminal executions.

pub mod retry_scheduler;

pub use retry_scheduler::RetryScheduler;
