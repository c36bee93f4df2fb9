//! Workflow Execution Engine
//!
//! Drives a workflow run on top of the scheduler:
//! - Dispatches ready steps to worker threads, up to `max_parallel`
//! - Funnels every completion back to one coordinator over a channel
//! - Skips the subtree below each failed step
//! - Optionally cancels the rest of the run on a critical failure
//!
//! The coordinator thread is the only writer of the execution state.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;

use super::runner::StepRunner;
use crate::error::{Result, SchedulerError};
use crate::monitoring::{EventType, ExecutionTimeline, RunSummary};
use crate::scheduler::{
    DependencyGraph, ExecutionState, ExecutionStateTracker, FailureCascadeResolver,
    IncrementalReadinessTracker, TopologicalScheduler, CANCELLED_REASON,
};
use crate::workflow::{validate_workflow, Workflow};

type Completion = (String, std::result::Result<Value, String>);

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of steps running at once
    pub max_parallel: usize,
    /// Run steps one at a time on the coordinator thread
    pub dry_run: bool,
    /// Cancel all pending steps as soon as a required step fails
    pub stop_on_critical_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel: num_cpus::get().max(1),
            dry_run: false,
            stop_on_critical_failure: false,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: ExecutionState,
    pub summary: RunSummary,
    pub timeline: ExecutionTimeline,
}

impl RunReport {
    /// True when no step marked `required_for_workflow` failed.
    pub fn succeeded(&self) -> bool {
        self.summary.succeeded()
    }
}

/// Workflow execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use agentflow::execution::{DryRunRunner, Engine};
/// use agentflow::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow("feature.yaml")?;
///     let mut engine = Engine::from_workflow(&workflow, DryRunRunner::new())?;
///     engine.set_max_parallel(4);
///
///     let report = engine.run()?;
///     println!("{}", report.summary);
///     Ok(())
/// }
/// ```
pub struct Engine {
    graph: DependencyGraph,
    runner: Arc<dyn StepRunner>,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine over an already built graph.
    pub fn new(graph: DependencyGraph, runner: impl StepRunner + 'static) -> Self {
        Self {
            graph,
            runner: Arc::new(runner),
            config: EngineConfig::default(),
        }
    }

    /// Validates a workflow and creates an engine for it.
    pub fn from_workflow(workflow: &Workflow, runner: impl StepRunner + 'static) -> Result<Self> {
        let graph = validate_workflow(workflow)?;
        Ok(Self::new(graph, runner))
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_max_parallel(&mut self, max: usize) {
        self.config.max_parallel = max;
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.config.dry_run = dry_run;
    }

    pub fn set_stop_on_critical_failure(&mut self, stop: bool) {
        self.config.stop_on_critical_failure = stop;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Runs every step of the workflow from scratch.
    pub fn run(&self) -> Result<RunReport> {
        self.execute(ExecutionStateTracker::new(&self.graph))
    }

    /// Continues a run from a previously captured state.
    ///
    /// Resolved steps are kept; steps that were running start again.
    pub fn resume(&self, state: ExecutionState) -> Result<RunReport> {
        self.execute(ExecutionStateTracker::resume(&self.graph, state))
    }

    fn execute(&self, mut tracker: ExecutionStateTracker<'_>) -> Result<RunReport> {
        // Fails with CircularDependency before anything runs
        let plan = TopologicalScheduler::new(&self.graph).plan()?;

        let readiness = IncrementalReadinessTracker::new(&self.graph);
        let resolver = FailureCascadeResolver::new(&self.graph);
        let mut timeline = ExecutionTimeline::new();
        let max_parallel = self.config.max_parallel.max(1);

        info!(
            "Starting execution: {} steps in {} levels (max parallel: {}, dry run: {})",
            plan.step_count(),
            plan.levels().len(),
            max_parallel,
            self.config.dry_run
        );

        // Failures carried over from a checkpoint still take their subtree down
        let mut cancelled = false;
        let mut carried: Vec<String> = tracker.state().failed.iter().cloned().collect();
        carried.sort();
        for id in &carried {
            cancelled |= self.cascade(id, &mut tracker, &resolver, &mut timeline);
        }

        let (tx, rx): (Sender<Completion>, Receiver<Completion>) = channel();
        let mut running_count = 0;

        loop {
            if !cancelled {
                for id in readiness.get_dispatchable_steps(tracker.state()) {
                    if running_count >= max_parallel || cancelled {
                        break;
                    }
                    // An inline dry-run failure may have skipped this step already
                    if tracker.status_of(&id).is_terminal() {
                        continue;
                    }
                    let Some(step) = self.graph.step(&id) else {
                        continue;
                    };

                    info!("Starting step: {} ({})", id, step.display_name());
                    tracker.mark_running(&id)?;
                    timeline.add_event(id.as_str(), EventType::Started);

                    if self.config.dry_run {
                        let result = run_guarded(self.runner.as_ref(), step);
                        cancelled |=
                            self.record(&id, result, &mut tracker, &resolver, &mut timeline);
                        continue;
                    }

                    let tx = tx.clone();
                    let runner = Arc::clone(&self.runner);
                    let step = step.clone();

                    thread::spawn(move || {
                        let result = run_guarded(runner.as_ref(), &step);
                        if let Err(e) = tx.send((step.id.clone(), result)) {
                            error!("Failed to send completion signal: {}", e);
                        }
                    });

                    running_count += 1;
                }
            }

            if running_count == 0 {
                if cancelled || readiness.get_dispatchable_steps(tracker.state()).is_empty() {
                    break;
                }
                continue;
            }

            let (id, result) = rx.recv().map_err(|e| {
                SchedulerError::Execution(format!("Failed to receive step completion: {}", e))
            })?;
            running_count -= 1;

            cancelled |= self.record(&id, result, &mut tracker, &resolver, &mut timeline);
        }

        let unresolved = tracker.pending_steps();
        if !unresolved.is_empty() {
            warn!("Run ended with unresolved steps: {}", unresolved.join(", "));
        }

        let summary = RunSummary::from_state(&self.graph, tracker.state());
        info!("Run finished in {:.2?}: {}", timeline.elapsed(), summary.tally());

        Ok(RunReport {
            state: tracker.into_state(),
            summary,
            timeline,
        })
    }

    /// Records one step outcome. Returns true when the run must stop.
    fn record(
        &self,
        id: &str,
        result: std::result::Result<Value, String>,
        tracker: &mut ExecutionStateTracker<'_>,
        resolver: &FailureCascadeResolver<'_>,
        timeline: &mut ExecutionTimeline,
    ) -> bool {
        match result {
            Ok(output) => {
                info!("Step '{}' completed successfully", id);
                if let Err(e) = tracker.mark_completed(id, output) {
                    warn!("Ignoring completion of '{}': {}", id, e);
                    return false;
                }
                timeline.add_event(id, EventType::Completed);
                false
            }
            Err(message) => {
                error!("Step '{}' failed: {}", id, message);
                if let Err(e) = tracker.mark_failed(id, message) {
                    warn!("Ignoring failure of '{}': {}", id, e);
                    return false;
                }
                timeline.add_event(id, EventType::Failed);
                self.cascade(id, tracker, resolver, timeline)
            }
        }
    }

    /// Skips everything below a failed step. Returns true when the run must stop.
    fn cascade(
        &self,
        id: &str,
        tracker: &mut ExecutionStateTracker<'_>,
        resolver: &FailureCascadeResolver<'_>,
        timeline: &mut ExecutionTimeline,
    ) -> bool {
        for skipped in resolver.apply_failure(id, tracker) {
            timeline.add_event(skipped, EventType::Skipped);
        }

        let critical = self
            .graph
            .step(id)
            .is_some_and(|step| step.required_for_workflow);

        if critical && self.config.stop_on_critical_failure {
            warn!("Required step '{}' failed; cancelling the run", id);
            for cancelled in tracker.cancel_pending(CANCELLED_REASON) {
                timeline.add_event(cancelled, EventType::Skipped);
            }
            return true;
        }
        false
    }
}

/// Runs a step, turning a panicking runner into a step failure.
fn run_guarded(
    runner: &dyn StepRunner,
    step: &crate::workflow::StepSpec,
) -> std::result::Result<Value, String> {
    panic::catch_unwind(AssertUnwindSafe(|| runner.run(step)))
        .unwrap_or_else(|_| Err(format!("runner panicked while executing {}", step.id)))
}
