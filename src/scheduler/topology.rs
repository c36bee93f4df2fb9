//! Topological Scheduling
//!
//! Computes the full execution plan as ordered parallel levels using
//! layered Kahn's algorithm, and offers cycle diagnostics that never fail.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info};

use super::graph::DependencyGraph;
use crate::error::{Result, SchedulerError};

/// Ordered parallel levels produced by
/// [`TopologicalScheduler::resolve_execution_order`].
///
/// Steps inside one level share no dependency edge; level `k + 1` starts
/// only after every step of levels `0..=k` has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    levels: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn into_levels(self) -> Vec<Vec<String>> {
        self.levels
    }

    /// Zero-based level a step belongs to.
    pub fn level_index(&self, id: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|s| s == id))
    }

    /// Number of steps across all levels.
    pub fn step_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Widest level, i.e. the most steps that can run at once.
    pub fn max_parallelism(&self) -> usize {
        self.levels.iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, level) in self.levels.iter().enumerate() {
            writeln!(f, "Level {}: {}", index + 1, level.join(", "))?;
        }
        Ok(())
    }
}

/// Stateless scheduler over a borrowed [`DependencyGraph`].
pub struct TopologicalScheduler<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> TopologicalScheduler<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    /// Computes the execution levels.
    ///
    /// Each level is sorted ascending purely for determinism. Fails with
    /// [`SchedulerError::CircularDependency`] naming the sorted ids that
    /// could not be placed.
    pub fn resolve_execution_order(&self) -> Result<Vec<Vec<String>>> {
        self.plan().map(ExecutionPlan::into_levels)
    }

    /// Same as [`resolve_execution_order`](Self::resolve_execution_order),
    /// wrapped in an [`ExecutionPlan`].
    pub fn plan(&self) -> Result<ExecutionPlan> {
        let (levels, unresolved) = self.layered_kahn();

        if !unresolved.is_empty() {
            return Err(SchedulerError::CircularDependency { ids: unresolved });
        }

        let plan = ExecutionPlan { levels };
        info!(
            "Resolved execution order: {} steps in {} levels",
            plan.step_count(),
            plan.levels.len()
        );
        Ok(plan)
    }

    /// Printable plan for dry runs, one block per level with each step's
    /// agent and action.
    pub fn render_plan(&self) -> Result<String> {
        let plan = self.plan()?;
        let mut output = format!(
            "Execution plan: {} steps in {} levels\n",
            plan.step_count(),
            plan.levels.len()
        );

        for (index, level) in plan.levels.iter().enumerate() {
            let marker = if level.len() > 1 { " (parallel)" } else { "" };
            output.push_str(&format!("\nLevel {}{}:\n", index + 1, marker));

            for id in level {
                match self.graph.step(id) {
                    Some(step) => {
                        output.push_str(&format!("  - {} [{}: {}]", id, step.agent, step.action));
                        if !step.required_for_workflow {
                            output.push_str(" (optional)");
                        }
                        output.push('\n');
                    }
                    None => output.push_str(&format!("  - {}\n", id)),
                }
            }
        }

        Ok(output)
    }

    /// Lists every dependency cycle in the graph. Never fails.
    ///
    /// Walks the `dependencies` edges depth-first with an explicit stack.
    /// When a neighbour already on the current path is reached, the path
    /// slice from that neighbour through the current node is one cycle.
    /// Roots are visited in ascending id order so the output is stable.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();

        let mut roots: Vec<&str> = self.graph.step_ids().iter().map(String::as_str).collect();
        roots.sort_unstable();

        for root in roots {
            if visited.contains(root) {
                continue;
            }

            // (node, sorted neighbours, next neighbour index)
            let mut stack: Vec<(&str, Vec<&str>, usize)> = Vec::new();
            visited.insert(root);
            on_stack.insert(root);
            path.push(root);
            stack.push((root, self.sorted_dependencies(root), 0));

            while let Some((node, neighbours, index)) = stack.last_mut() {
                if *index < neighbours.len() {
                    let neighbour = neighbours[*index];
                    *index += 1;

                    if on_stack.contains(neighbour) {
                        if let Some(start) = path.iter().position(|id| *id == neighbour) {
                            let cycle: Vec<String> =
                                path[start..].iter().map(|id| id.to_string()).collect();
                            debug!("Found cycle: {}", cycle.join(" -> "));
                            cycles.push(cycle);
                        }
                    } else if !visited.contains(neighbour) {
                        visited.insert(neighbour);
                        on_stack.insert(neighbour);
                        path.push(neighbour);
                        let next = self.sorted_dependencies(neighbour);
                        stack.push((neighbour, next, 0));
                    }
                } else {
                    on_stack.remove(*node);
                    path.pop();
                    stack.pop();
                }
            }
        }

        cycles
    }

    /// Structural check of the graph.
    ///
    /// Returns human-readable problems; an empty list means the graph is a
    /// valid DAG. Covers `next` references to undefined steps,
    /// self-dependencies and cycles.
    pub fn validate_dag(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for step in self.graph.steps() {
            if let Some(next) = &step.next {
                if next == &step.id {
                    errors.push(format!("Step '{}' depends on itself via next", step.id));
                } else if !self.graph.contains(next) {
                    errors.push(format!(
                        "Step '{}' references undefined step '{}' as next",
                        step.id, next
                    ));
                }
            }

            if self.graph.get_dependencies(&step.id).contains(&step.id) {
                errors.push(format!("Step '{}' depends on itself", step.id));
            }

            for dep in sorted(self.graph.get_dependencies(&step.id)) {
                if !self.graph.contains(dep) {
                    errors.push(format!(
                        "Step '{}' depends on undefined step '{}'",
                        step.id, dep
                    ));
                }
            }
        }

        let (levels, unresolved) = self.layered_kahn();
        let placed: usize = levels.iter().map(Vec::len).sum();
        if placed != self.graph.len() {
            errors.push(
                SchedulerError::CircularDependency { ids: unresolved }.to_string(),
            );
        }

        errors
    }

    /// Returns the levels and the sorted ids left with unmet dependencies.
    fn layered_kahn(&self) -> (Vec<Vec<String>>, Vec<String>) {
        let mut in_degree: HashMap<&str, usize> = self
            .graph
            .step_ids()
            .iter()
            .map(|id| (id.as_str(), self.graph.get_dependencies(id).len()))
            .collect();

        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut levels: Vec<Vec<String>> = Vec::new();

        while !queue.is_empty() {
            let mut level = std::mem::take(&mut queue);
            level.sort_unstable();

            for id in &level {
                for dependent in self.graph.get_dependents(id) {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push(dependent.as_str());
                        }
                    }
                }
            }

            debug!("Level {}: {:?}", levels.len() + 1, level);
            levels.push(level.into_iter().map(str::to_string).collect());
        }

        let mut unresolved: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        unresolved.sort();

        (levels, unresolved)
    }

    fn sorted_dependencies(&self, id: &str) -> Vec<&'g str> {
        sorted(self.graph.get_dependencies(id))
    }
}

fn sorted(set: &HashSet<String>) -> Vec<&str> {
    let mut ids: Vec<&str> = set.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids
}
