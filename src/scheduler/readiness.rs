//! Incremental Readiness
//!
//! Answers "which steps can start now" for event-driven execution. A step
//! becomes eligible the moment its own predecessors finish, without waiting
//! for unrelated steps of an earlier level.

use std::collections::HashSet;

use super::graph::DependencyGraph;
use super::state::ExecutionState;

/// Stateless readiness queries over a borrowed graph.
///
/// Holds no memory between calls; each query is O(V + E).
pub struct IncrementalReadinessTracker<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> IncrementalReadinessTracker<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    /// Returns the sorted ids not yet in `completed` whose dependencies
    /// are all in `completed`.
    pub fn get_ready_steps(&self, completed: &HashSet<String>) -> Vec<String> {
        let mut ready: Vec<String> = self
            .graph
            .step_ids()
            .iter()
            .filter(|id| !completed.contains(*id))
            .filter(|id| self.graph.get_dependencies(id).is_subset(completed))
            .cloned()
            .collect();
        ready.sort();
        ready
    }

    /// Ready steps that can actually be dispatched: excludes steps that
    /// are already running, failed or skipped.
    pub fn get_dispatchable_steps(&self, state: &ExecutionState) -> Vec<String> {
        self.get_ready_steps(&state.completed)
            .into_iter()
            .filter(|id| {
                !state.running.contains(id)
                    && !state.failed.contains(id)
                    && !state.skipped.contains(id)
            })
            .collect()
    }
}
