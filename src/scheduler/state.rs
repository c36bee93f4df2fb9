//! Execution State
//!
//! Per-run state machine for workflow steps:
//!
//! ```text
//! PENDING ──> RUNNING ──> COMPLETED | FAILED | SKIPPED
//!    └───────────────────────────────────────┘
//! ```
//!
//! PENDING is implicit (absence from every set). Terminal states accept no
//! further transitions.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::graph::DependencyGraph;
use crate::error::{Result, SchedulerError};

/// Reason used when the remaining steps of a run are abandoned.
pub const CANCELLED_REASON: &str = "workflow cancelled";

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Payload stored for a resolved step.
///
/// Serialised untagged: a completed step stores its output value as is,
/// a failed one `{"error": ...}` and a skipped one `{"skipped": ...}`.
/// The shapes overlap, so results are only read back as part of an
/// [`ExecutionState`], where the owning set decides the variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepResult {
    Failed { error: String },
    Skipped { skipped: String },
    Output(Value),
}

/// Caller-owned record of a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredState")]
pub struct ExecutionState {
    #[serde(default)]
    pub completed: HashSet<String>,
    #[serde(default)]
    pub failed: HashSet<String>,
    #[serde(default)]
    pub skipped: HashSet<String>,
    #[serde(default)]
    pub running: HashSet<String>,
    #[serde(default)]
    pub results: HashMap<String, StepResult>,
}

/// Serialised form of [`ExecutionState`] with results still raw.
#[derive(Deserialize)]
struct StoredState {
    #[serde(default)]
    completed: HashSet<String>,
    #[serde(default)]
    failed: HashSet<String>,
    #[serde(default)]
    skipped: HashSet<String>,
    #[serde(default)]
    running: HashSet<String>,
    #[serde(default)]
    results: HashMap<String, Value>,
}

impl From<StoredState> for ExecutionState {
    fn from(stored: StoredState) -> Self {
        let StoredState {
            completed,
            failed,
            skipped,
            running,
            results,
        } = stored;

        let results = results
            .into_iter()
            .map(|(id, value)| {
                let result = if failed.contains(&id) {
                    StepResult::Failed {
                        error: message_field(value, "error"),
                    }
                } else if skipped.contains(&id) {
                    StepResult::Skipped {
                        skipped: message_field(value, "skipped"),
                    }
                } else {
                    StepResult::Output(value)
                };
                (id, result)
            })
            .collect();

        Self {
            completed,
            failed,
            skipped,
            running,
            results,
        }
    }
}

/// Pulls the message out of a stored `{key: message}` result.
fn message_field(value: Value, key: &str) -> String {
    match value {
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        Value::String(message) => message,
        other => other.to_string(),
    }
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of completed, failed and skipped.
    pub fn all_processed(&self) -> HashSet<String> {
        self.completed
            .iter()
            .chain(&self.failed)
            .chain(&self.skipped)
            .cloned()
            .collect()
    }

    pub fn status_of(&self, id: &str) -> StepStatus {
        if self.completed.contains(id) {
            StepStatus::Completed
        } else if self.failed.contains(id) {
            StepStatus::Failed
        } else if self.skipped.contains(id) {
            StepStatus::Skipped
        } else if self.running.contains(id) {
            StepStatus::Running
        } else {
            StepStatus::Pending
        }
    }
}

/// Drives [`ExecutionState`] through its transitions for one graph.
///
/// Callers running steps concurrently must funnel every `mark_*` call
/// through one owner of the tracker.
pub struct ExecutionStateTracker<'g> {
    graph: &'g DependencyGraph,
    state: ExecutionState,
}

impl<'g> ExecutionStateTracker<'g> {
    /// Creates a tracker with every step pending.
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            state: ExecutionState::new(),
        }
    }

    /// Rebuilds a tracker from a previously captured state.
    ///
    /// Ids the graph no longer knows are dropped and steps that were
    /// running when the state was captured go back to pending.
    pub fn resume(graph: &'g DependencyGraph, mut state: ExecutionState) -> Self {
        for id in state.running.drain() {
            debug!("Step '{}' was running; resetting to pending", id);
        }
        state.completed.retain(|id| graph.contains(id));
        state.failed.retain(|id| graph.contains(id));
        state.skipped.retain(|id| graph.contains(id));
        state.results.retain(|id, _| {
            state.completed.contains(id) || state.failed.contains(id) || state.skipped.contains(id)
        });

        info!(
            "Resuming run: {} completed, {} failed, {} skipped",
            state.completed.len(),
            state.failed.len(),
            state.skipped.len()
        );

        Self { graph, state }
    }

    pub fn graph(&self) -> &'g DependencyGraph {
        self.graph
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn into_state(self) -> ExecutionState {
        self.state
    }

    pub fn status_of(&self, id: &str) -> StepStatus {
        self.state.status_of(id)
    }

    pub fn result(&self, id: &str) -> Option<&StepResult> {
        self.state.results.get(id)
    }

    /// Marks a step as running. Repeating the call is a no-op.
    pub fn mark_running(&mut self, id: &str) -> Result<()> {
        self.check_transition(id, StepStatus::Running)?;
        self.state.running.insert(id.to_string());
        debug!("Step '{}' running", id);
        Ok(())
    }

    /// Marks a step as completed and stores its output.
    pub fn mark_completed(&mut self, id: &str, result: Value) -> Result<()> {
        self.check_transition(id, StepStatus::Completed)?;
        self.state.running.remove(id);
        self.state.completed.insert(id.to_string());
        self.state
            .results
            .insert(id.to_string(), StepResult::Output(result));
        debug!("Step '{}' completed", id);
        Ok(())
    }

    /// Marks a step as failed and stores the error.
    pub fn mark_failed(&mut self, id: &str, error: impl Into<String>) -> Result<()> {
        self.check_transition(id, StepStatus::Failed)?;
        let error = error.into();
        self.state.running.remove(id);
        self.state.failed.insert(id.to_string());
        debug!("Step '{}' failed: {}", id, error);
        self.state
            .results
            .insert(id.to_string(), StepResult::Failed { error });
        Ok(())
    }

    /// Marks a step as skipped and stores the reason.
    pub fn mark_skipped(&mut self, id: &str, reason: impl Into<String>) -> Result<()> {
        self.check_transition(id, StepStatus::Skipped)?;
        let reason = reason.into();
        self.state.running.remove(id);
        self.state.skipped.insert(id.to_string());
        debug!("Step '{}' skipped: {}", id, reason);
        self.state
            .results
            .insert(id.to_string(), StepResult::Skipped { skipped: reason });
        Ok(())
    }

    /// Skips every step that has not started yet. Returns the skipped ids,
    /// sorted.
    pub fn cancel_pending(&mut self, reason: &str) -> Vec<String> {
        let pending = self.pending_steps();
        for id in &pending {
            // pending ids always accept a skip
            if let Err(e) = self.mark_skipped(id, reason) {
                warn!("Could not cancel step '{}': {}", id, e);
            }
        }
        if !pending.is_empty() {
            info!("Cancelled {} pending steps: {}", pending.len(), reason);
        }
        pending
    }

    /// Ids neither running nor resolved, sorted.
    pub fn pending_steps(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graph
            .step_ids()
            .iter()
            .filter(|id| self.state.status_of(id) == StepStatus::Pending)
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Union of completed, failed and skipped.
    pub fn all_processed(&self) -> HashSet<String> {
        self.state.all_processed()
    }

    /// True once every step of the graph has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        let processed = self.all_processed();
        self.graph
            .step_ids()
            .iter()
            .all(|id| processed.contains(id))
    }

    /// True if any failed step is marked `required_for_workflow`.
    pub fn has_critical_failures(&self) -> bool {
        self.state.failed.iter().any(|id| {
            self.graph
                .step(id)
                .map(|step| step.required_for_workflow)
                .unwrap_or(false)
        })
    }

    /// Failed steps whose failure is critical, sorted.
    pub fn critical_failures(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state
            .failed
            .iter()
            .filter(|id| {
                self.graph
                    .step(id)
                    .is_some_and(|step| step.required_for_workflow)
            })
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn check_transition(&self, id: &str, to: StepStatus) -> Result<()> {
        if !self.graph.contains(id) {
            return Err(SchedulerError::UnknownStep(id.to_string()));
        }

        let from = self.state.status_of(id);
        if from.is_terminal() {
            return Err(SchedulerError::InvalidTransition {
                step: id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
