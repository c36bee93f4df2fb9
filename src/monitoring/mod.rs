//! Run Monitoring Module
//!
//! Utilities for reporting on a workflow run once steps start moving.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: step start/end events for Gantt charts
//! - [`RunSummary`]: final COMPLETED/FAILED/SKIPPED tally with reasons

pub mod summary;
pub mod timeline;

pub use summary::RunSummary;
pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
