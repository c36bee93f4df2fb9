//! agentflow - Dependency-Graph Scheduler for Agent Workflows
//!
//! Decides, for a workflow of steps performed by different agents, the
//! order in which steps may run, which steps can run concurrently, and
//! which steps must be skipped once an upstream step fails. Dependencies
//! are never declared directly: they are derived from the artifacts each
//! step requires and creates, plus optional `next` pointers.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`workflow`]: Step declarations, YAML loading and validation
//! - [`scheduler`]: Dependency graph, execution order, readiness, state and failure cascade
//! - [`execution`]: Coordinator engine running steps on worker threads
//! - [`monitoring`]: Execution timeline and run summary
//!
//! # Example
//!
//! ```rust,no_run
//! use agentflow::execution::{DryRunRunner, Engine};
//! use agentflow::load_workflow;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load and validate a workflow from YAML
//!     let workflow = load_workflow("feature.yaml")?;
//!
//!     // Simulate it without invoking any agent
//!     let mut engine = Engine::from_workflow(&workflow, DryRunRunner::new())?;
//!     engine.set_max_parallel(4);
//!
//!     let report = engine.run()?;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod monitoring;
pub mod scheduler;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use execution::{Engine, EngineConfig, RunReport, StepRunner};
pub use scheduler::{
    DependencyGraph, DependencyGraphBuilder, ExecutionState, ExecutionStateTracker,
    FailureCascadeResolver, IncrementalReadinessTracker, TopologicalScheduler,
};
pub use workflow::{load_workflow, StepSpec, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "agentflow";
