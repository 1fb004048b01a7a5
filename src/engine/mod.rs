//! # Workflow Engine
//!
//! Top-level coordinator and the pluggable execution strategies that
//! drive task lifecycles for one workflow execution.

pub mod strategy;
pub mod workflow_engine;

pub use strategy::{
    default_strategies, ConditionalStrategy, ExecutionStrategy, ParallelStrategy,
    SequentialStrategy, StrategyServices,
};
pub use workflow_engine::WorkflowEngine;
