//! Dynamic layer: configuration-driven tools and workflows.
//!
//! At start-up the config file is loaded, validated, and materialised
//! into registered MCP tools; at call time the synthesised handlers
//! resolve parameters, substitute placeholders, and dispatch to the
//! executors.

pub mod config;
pub mod executor;
pub mod generator;
pub mod params;
pub mod workflow;

pub use config::{
    DynamicConfig, OperationType, ServerInfoConfig, TaskConfig, TaskParameter, WorkflowConfig,
    WorkflowStep,
};
pub use executor::{ExecutorSet, TaskExecutor};
pub use generator::{register_tools, RunnerMap, TaskRunner};
