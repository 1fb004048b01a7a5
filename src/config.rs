//! # Orchestrator Configuration
//!
//! Typed configuration for the workflow engine, scheduler, retry policy
//! and event publishing, with environment-variable overrides.

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};

/// Root configuration for the orchestration core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub events: EventsConfig,
    pub execution: ExecutionConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub retention: RetentionConfig,
}

/// Event publishing options (`workflow.events.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Master switch for lifecycle event publication
    pub enabled: bool,
    /// Level used when logging published events
    pub log_level: EventLogLevel,
}

/// Log level for published lifecycle events (`workflow.events.log-level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Task execution options (`workflow.task.execution.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Bound on concurrently running strategy drivers and local executors
    pub thread_pool_size: usize,
}

/// Retry backoff options (`workflow.retry.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
}

/// Retry scheduler options (`workflow.scheduler.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between retry-scheduler ticks
    pub tick_seconds: u64,
    /// Age in hours after which paused / review-blocked workflows are
    /// reported by the maintenance sweep
    pub stuck_threshold_hours: i64,
}

/// Cleanup options (`workflow.retention.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Days a terminal workflow execution is kept before being purged
    pub terminal_days: i64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: EventLogLevel::Info,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval_ms: 1000,
            multiplier: 2.0,
            max_interval_ms: 60_000,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 30,
            stuck_threshold_hours: 24,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { terminal_days: 30 }
    }
}

impl std::str::FromStr for EventLogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("Invalid event log level: {s}")),
        }
    }
}

impl OrchestratorConfig {
    /// Build a configuration from defaults plus `WORKFLOW_*` environment
    /// overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(enabled) = std::env::var("WORKFLOW_EVENTS_ENABLED") {
            config.events.enabled = parse_var("WORKFLOW_EVENTS_ENABLED", &enabled)?;
        }
        if let Ok(level) = std::env::var("WORKFLOW_EVENTS_LOG_LEVEL") {
            config.events.log_level = level
                .parse()
                .map_err(WorkflowError::Configuration)?;
        }
        if let Ok(size) = std::env::var("WORKFLOW_TASK_THREAD_POOL_SIZE") {
            config.execution.thread_pool_size = parse_var("WORKFLOW_TASK_THREAD_POOL_SIZE", &size)?;
            if config.execution.thread_pool_size < 1 {
                return Err(WorkflowError::Configuration(
                    "WORKFLOW_TASK_THREAD_POOL_SIZE must be >= 1".to_string(),
                ));
            }
        }
        if let Ok(attempts) = std::env::var("WORKFLOW_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_var("WORKFLOW_RETRY_MAX_ATTEMPTS", &attempts)?;
        }
        if let Ok(initial) = std::env::var("WORKFLOW_RETRY_INITIAL_INTERVAL_MS") {
            config.retry.initial_interval_ms =
                parse_var("WORKFLOW_RETRY_INITIAL_INTERVAL_MS", &initial)?;
        }
        if let Ok(multiplier) = std::env::var("WORKFLOW_RETRY_MULTIPLIER") {
            config.retry.multiplier = parse_var("WORKFLOW_RETRY_MULTIPLIER", &multiplier)?;
        }
        if let Ok(max) = std::env::var("WORKFLOW_RETRY_MAX_INTERVAL_MS") {
            config.retry.max_interval_ms = parse_var("WORKFLOW_RETRY_MAX_INTERVAL_MS", &max)?;
        }
        if let Ok(tick) = std::env::var("WORKFLOW_SCHEDULER_TICK_SECONDS") {
            config.scheduler.tick_seconds = parse_var("WORKFLOW_SCHEDULER_TICK_SECONDS", &tick)?;
        }
        if let Ok(days) = std::env::var("WORKFLOW_RETENTION_TERMINAL_DAYS") {
            config.retention.terminal_days = parse_var("WORKFLOW_RETENTION_TERMINAL_DAYS", &days)?;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| WorkflowError::Configuration(format!("Invalid {name}: {e}")))
}
