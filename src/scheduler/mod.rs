//! Dependency-Graph Scheduler
//!
//! The decision engine behind a workflow run. It is synchronous and holds
//! no shared state: every component borrows one immutable
//! [`DependencyGraph`], and the only mutable piece is the caller-owned
//! [`ExecutionState`].
//!
//! # Components
//!
//! - [`graph`]: builds the graph from step declarations
//! - [`topology`]: level plan, cycle detection, DAG validation
//! - [`readiness`]: which steps can start given a completed set
//! - [`state`]: per-step state machine
//! - [`cascade`]: skip sets and skip reasons after a failure
//!
//! # Example
//!
//! ```
//! use agentflow::scheduler::{DependencyGraph, TopologicalScheduler};
//! use agentflow::workflow::StepSpec;
//!
//! let steps = vec![
//!     StepSpec::new("collect", "analyst", "gather").creates("requirements"),
//!     StepSpec::new("plan", "architect", "draft").requires("requirements"),
//! ];
//! let graph = DependencyGraph::from_steps(&steps).unwrap();
//! let levels = TopologicalScheduler::new(&graph).resolve_execution_order().unwrap();
//! assert_eq!(levels, vec![vec!["collect"], vec!["plan"]]);
//! ```

pub mod cascade;
pub mod graph;
pub mod readiness;
pub mod state;
pub mod topology;

pub use cascade::FailureCascadeResolver;
pub use graph::{DependencyGraph, DependencyGraphBuilder};
pub use readiness::IncrementalReadinessTracker;
pub use state::{
    ExecutionState, ExecutionStateTracker, StepResult, StepStatus, CANCELLED_REASON,
};
pub use topology::{ExecutionPlan, TopologicalScheduler};
