//! Failure Cascade
//!
//! When a step fails, everything downstream of it can no longer run. A step
//! is blocked as soon as any one of its direct predecessors has failed,
//! since that predecessor may be the only producer of an artifact it needs.

use std::collections::{HashSet, VecDeque};

use log::warn;

use super::graph::DependencyGraph;
use super::state::{ExecutionState, ExecutionStateTracker, StepStatus};

/// Computes skip sets and skip reasons for failed steps.
pub struct FailureCascadeResolver<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> FailureCascadeResolver<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    /// True if any direct dependency of `id` has failed.
    pub fn should_skip_step(&self, id: &str, state: &ExecutionState) -> bool {
        self.graph
            .get_dependencies(id)
            .iter()
            .any(|dep| state.failed.contains(dep))
    }

    /// Describes why `id` is blocked by failed direct dependencies.
    pub fn get_skip_reason(&self, id: &str, state: &ExecutionState) -> String {
        let mut failed: Vec<&String> = self
            .graph
            .get_dependencies(id)
            .iter()
            .filter(|dep| state.failed.contains(*dep))
            .collect();
        failed.sort();

        match failed.as_slice() {
            [] => "No failed dependencies".to_string(),
            [only] => format!("Dependency step {} ({}) failed", only, self.name_of(only)),
            many => {
                let listed: Vec<String> = many
                    .iter()
                    .map(|dep| format!("{} ({})", dep, self.name_of(dep)))
                    .collect();
                format!("Multiple dependencies failed: {}", listed.join(", "))
            }
        }
    }

    /// Every step reachable from `failed_id` through dependents, sorted.
    /// The failed step itself is not included.
    pub fn get_steps_to_skip_on_failure(&self, failed_id: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        seen.insert(failed_id);
        queue.push_back(failed_id);

        let mut to_skip = Vec::new();

        while let Some(current) = queue.pop_front() {
            for dependent in self.graph.get_dependents(current) {
                if seen.insert(dependent.as_str()) {
                    to_skip.push(dependent.clone());
                    queue.push_back(dependent.as_str());
                }
            }
        }

        to_skip.sort();
        to_skip
    }

    /// Marks every unresolved step downstream of `failed_id` as skipped.
    ///
    /// Direct dependents get [`get_skip_reason`](Self::get_skip_reason);
    /// steps further down are attributed to the upstream failure. Returns
    /// the ids newly skipped, sorted.
    pub fn apply_failure(
        &self,
        failed_id: &str,
        tracker: &mut ExecutionStateTracker<'_>,
    ) -> Vec<String> {
        let mut skipped = Vec::new();

        for id in self.get_steps_to_skip_on_failure(failed_id) {
            match tracker.status_of(&id) {
                status if status.is_terminal() => continue,
                StepStatus::Running => {
                    warn!(
                        "Step '{}' is already running; leaving it to finish despite failure of '{}'",
                        id, failed_id
                    );
                    continue;
                }
                _ => {}
            }

            let reason = if self.should_skip_step(&id, tracker.state()) {
                self.get_skip_reason(&id, tracker.state())
            } else {
                format!(
                    "Upstream step {} ({}) failed",
                    failed_id,
                    self.name_of(failed_id)
                )
            };

            match tracker.mark_skipped(&id, reason.as_str()) {
                Ok(()) => {
                    warn!("Skipping step '{}': {}", id, reason);
                    skipped.push(id);
                }
                Err(e) => warn!("Could not skip step '{}': {}", id, e),
            }
        }

        skipped
    }

    fn name_of(&self, id: &str) -> &str {
        self.graph
            .step(id)
            .map(|step| step.display_name())
            .unwrap_or("unknown")
    }
}
