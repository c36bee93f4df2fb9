//! Workflow Execution Module
//!
//! Runs a validated workflow: the engine dispatches ready steps to worker
//! threads and keeps the execution state on a single coordinator.
//!
//! # Architecture
//!
//! - [`engine`]: coordinator loop, failure cascade and cancellation
//! - [`runner`]: the [`StepRunner`] seam and the dry-run runner

pub mod engine;
pub mod runner;

pub use engine::{Engine, EngineConfig, RunReport};
pub use runner::{DryRunRunner, StepRunner};
