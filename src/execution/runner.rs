//! Step Runners
//!
//! A [`StepRunner`] does the actual work of one step, such as invoking an
//! agent, and reports either an output value or an error message. The
//! engine calls runners from worker threads, so they must be `Send + Sync`.

use std::collections::HashSet;

use log::debug;
use serde_json::{json, Value};

use crate::workflow::StepSpec;

/// Executes a single workflow step.
///
/// An `Err` is a step failure: the engine records it and skips the steps
/// downstream of it. Any `Fn(&StepSpec) -> Result<Value, String>` closure
/// is a runner.
pub trait StepRunner: Send + Sync {
    fn run(&self, step: &StepSpec) -> Result<Value, String>;
}

impl<F> StepRunner for F
where
    F: Fn(&StepSpec) -> Result<Value, String> + Send + Sync,
{
    fn run(&self, step: &StepSpec) -> Result<Value, String> {
        self(step)
    }
}

/// Runner that prints each step instead of invoking its agent.
///
/// Steps listed with [`fail_step`](Self::fail_step) fail, which previews
/// how a failure cascades through the workflow.
#[derive(Debug, Clone, Default)]
pub struct DryRunRunner {
    fail_steps: HashSet<String>,
    quiet: bool,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the given step fail when it runs.
    pub fn fail_step(mut self, id: impl Into<String>) -> Self {
        self.fail_steps.insert(id.into());
        self
    }

    /// Suppresses the per-step printout.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

impl StepRunner for DryRunRunner {
    fn run(&self, step: &StepSpec) -> Result<Value, String> {
        if !self.quiet {
            println!();
            println!("[DRY RUN] Step: {}", step.id);
            println!("  Agent: {}", step.agent);
            println!("  Action: {}", step.action);
            println!("  Requires: {:?}", step.requires);
            println!("  Creates: {:?}", step.creates);
            if let Some(next) = &step.next {
                println!("  Next: {}", next);
            }
        }

        if self.fail_steps.contains(&step.id) {
            debug!("Dry run failing step '{}' on request", step.id);
            return Err(format!("simulated failure of {}", step.id));
        }

        Ok(json!({
            "dry_run": true,
            "creates": step.creates,
        }))
    }
}
