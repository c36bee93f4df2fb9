//! Run Summary
//!
//! Final COMPLETED/FAILED/SKIPPED tally of a run, with the error of every
//! failed step and the reason every skipped step did not run.

use std::fmt;

use colored::Colorize;
use serde::Serialize;

use crate::scheduler::{DependencyGraph, ExecutionState, StepResult};

/// Outcome counts and details for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: Vec<String>,
    /// `(step id, error)`, sorted by id
    pub failed: Vec<(String, String)>,
    /// `(step id, reason)`, sorted by id
    pub skipped: Vec<(String, String)>,
    /// Failed steps marked `required_for_workflow`, sorted
    pub critical: Vec<String>,
}

impl RunSummary {
    /// Tallies `state` against the steps of `graph`.
    pub fn from_state(graph: &DependencyGraph, state: &ExecutionState) -> Self {
        let mut completed: Vec<String> = state.completed.iter().cloned().collect();
        completed.sort();

        let mut failed: Vec<(String, String)> = state
            .failed
            .iter()
            .map(|id| {
                let error = match state.results.get(id) {
                    Some(StepResult::Failed { error }) => error.clone(),
                    _ => "unknown error".to_string(),
                };
                (id.clone(), error)
            })
            .collect();
        failed.sort();

        let mut skipped: Vec<(String, String)> = state
            .skipped
            .iter()
            .map(|id| {
                let reason = match state.results.get(id) {
                    Some(StepResult::Skipped { skipped }) => skipped.clone(),
                    _ => "no reason recorded".to_string(),
                };
                (id.clone(), reason)
            })
            .collect();
        skipped.sort();

        let mut critical: Vec<String> = state
            .failed
            .iter()
            .filter(|id| graph.step(id).is_some_and(|s| s.required_for_workflow))
            .cloned()
            .collect();
        critical.sort();

        Self {
            total: graph.len(),
            completed,
            failed,
            skipped,
            critical,
        }
    }

    /// True when no critical step failed.
    pub fn succeeded(&self) -> bool {
        self.critical.is_empty()
    }

    /// Steps that never reached a terminal state.
    pub fn unresolved(&self) -> usize {
        self.total
            .saturating_sub(self.completed.len() + self.failed.len() + self.skipped.len())
    }

    /// One-line tally.
    pub fn tally(&self) -> String {
        format!(
            "COMPLETED: {}  FAILED: {}  SKIPPED: {}",
            self.completed.len(),
            self.failed.len(),
            self.skipped.len()
        )
    }

    /// Multi-line report coloured for a terminal.
    pub fn render(&self) -> String {
        let mut output = String::new();

        for (id, error) in &self.failed {
            let marker = if self.critical.contains(id) {
                "FAILED".red().bold()
            } else {
                "FAILED (optional)".yellow()
            };
            output.push_str(&format!("  {} {}: {}\n", marker, id.bold(), error));
        }

        for (id, reason) in &self.skipped {
            output.push_str(&format!("  {} {}: {}\n", "SKIPPED".dimmed(), id, reason));
        }

        if !output.is_empty() {
            output.push('\n');
        }

        let tally = self.tally();
        let tally = if self.succeeded() {
            tally.green()
        } else {
            tally.red()
        };
        output.push_str(&format!("{}\n", tally));

        if self.unresolved() > 0 {
            output.push_str(&format!(
                "{}\n",
                format!("{} steps never resolved", self.unresolved()).yellow()
            ));
        }

        output
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
