//! Workflow Validation
//!
//! Provides validation for workflow structures including:
//! - Step field validation
//! - Reference integrity checking for `next`
//! - Dependency graph validation (no cycles)
//!
//! Structural problems fail fast here, before any step runs.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use super::model::{StepSpec, Workflow};
use crate::error::{Result, SchedulerError};
use crate::scheduler::{DependencyGraph, TopologicalScheduler};

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyWorkflow,
    DuplicateStepId(String),
    EmptyStepId,
    EmptyAgent(String),
    InvalidReference { step: String, reference: String },
    SelfReference(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWorkflow => write!(f, "Workflow has no steps"),
            Self::DuplicateStepId(id) => write!(f, "Duplicate step ID: '{}'", id),
            Self::EmptyStepId => write!(f, "Step has empty or whitespace-only ID"),
            Self::EmptyAgent(step) => write!(f, "Step '{}' has no agent specified", step),
            Self::InvalidReference { step, reference } => {
                write!(f, "Step '{}' references unknown step '{}'", step, reference)
            }
            Self::SelfReference(step) => write!(f, "Step '{}' names itself as next", step),
        }
    }
}

/// Validates a single step's fields.
fn validate_step(step: &StepSpec, known_ids: &HashSet<&str>) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.id.trim().is_empty() {
        errors.push(ValidationError::EmptyStepId);
        return errors; // Can't validate further without ID
    }

    if step.agent.trim().is_empty() {
        errors.push(ValidationError::EmptyAgent(step.id.clone()));
    }

    if let Some(next) = &step.next {
        if next == &step.id {
            errors.push(ValidationError::SelfReference(step.id.clone()));
        } else if !known_ids.contains(next.as_str()) {
            errors.push(ValidationError::InvalidReference {
                step: step.id.clone(),
                reference: next.clone(),
            });
        }
    }

    if step.action.trim().is_empty() {
        warn!("Step '{}' has no action specified", step.id);
    }

    if step.requires.is_empty() && step.next.is_none() {
        debug!("Step '{}' consumes no artifacts", step.id);
    }

    errors
}

/// Validates the entire workflow and returns its dependency graph.
///
/// Performs the following checks:
/// 1. Workflow is not empty
/// 2. No duplicate step IDs
/// 3. All steps have valid fields and `next` references
/// 4. The graph passes [`TopologicalScheduler::validate_dag`]
/// 5. The execution order resolves (no cycles)
pub fn validate_workflow(workflow: &Workflow) -> Result<DependencyGraph> {
    info!("Validating workflow with {} steps", workflow.steps.len());

    if workflow.steps.is_empty() {
        return Err(configuration(vec![ValidationError::EmptyWorkflow]));
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(configuration(vec![ValidationError::DuplicateStepId(
                step.id.clone(),
            )]));
        }
    }

    let field_errors: Vec<ValidationError> = workflow
        .steps
        .iter()
        .flat_map(|step| validate_step(step, &seen_ids))
        .collect();
    if !field_errors.is_empty() {
        return Err(configuration(field_errors));
    }

    let graph = DependencyGraph::from_steps(&workflow.steps)?;
    let scheduler = TopologicalScheduler::new(&graph);

    // Cycles surface below as CircularDependency rather than as configuration.
    let structural: Vec<String> = scheduler
        .validate_dag()
        .into_iter()
        .filter(|e| !e.starts_with("Circular dependency"))
        .collect();
    if !structural.is_empty() {
        return Err(SchedulerError::Configuration(structural.join("\n")));
    }

    let plan = scheduler.plan()?;

    info!(
        "Workflow validated: {} steps, {} levels, {} agents",
        graph.len(),
        plan.levels().len(),
        workflow.agents().len()
    );

    Ok(graph)
}

/// Quick validation that returns a list of findings instead of failing fast.
///
/// Includes cycles and artifacts that no step produces. Useful for the
/// `--check` CLI mode.
pub fn quick_validate(workflow: &Workflow) -> Vec<String> {
    let mut errors = Vec::new();

    if workflow.steps.is_empty() {
        errors.push(ValidationError::EmptyWorkflow.to_string());
        return errors;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for step in &workflow.steps {
        *counts.entry(step.id.as_str()).or_default() += 1;
    }
    let mut duplicates: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(id, _)| *id)
        .collect();
    duplicates.sort_unstable();
    let mut graph_unbuildable = !duplicates.is_empty();
    for id in duplicates {
        errors.push(ValidationError::DuplicateStepId(id.to_string()).to_string());
    }

    let known_ids: HashSet<&str> = counts.keys().copied().collect();
    for step in &workflow.steps {
        let step_errors = validate_step(step, &known_ids);
        graph_unbuildable |= step_errors.contains(&ValidationError::EmptyStepId);
        errors.extend(step_errors.iter().map(|e| e.to_string()));
    }

    let produced: HashSet<&str> = workflow
        .steps
        .iter()
        .flat_map(|s| s.creates.iter().map(String::as_str))
        .collect();
    for step in &workflow.steps {
        for artifact in &step.requires {
            if !produced.contains(artifact.as_str()) {
                errors.push(format!(
                    "Step '{}': artifact '{}' is not created by any step (must be provided externally)",
                    step.id, artifact
                ));
            }
        }
    }

    if graph_unbuildable {
        return errors;
    }

    match DependencyGraph::from_steps(&workflow.steps) {
        Ok(graph) => {
            let scheduler = TopologicalScheduler::new(&graph);
            for cycle in scheduler.detect_cycles() {
                errors.push(format!("Cycle: {}", cycle.join(" -> ")));
            }
        }
        Err(e) => errors.push(e.to_string()),
    }

    errors
}

fn configuration(errors: Vec<ValidationError>) -> SchedulerError {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    SchedulerError::Configuration(messages.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str) -> StepSpec {
        StepSpec::new(id, "dev", "code")
    }

    #[test]
    fn test_valid_workflow() {
        let workflow = Workflow::from_steps(vec![
            step("step1").creates("out"),
            step("step2").requires("out"),
        ]);

        let graph = validate_workflow(&workflow).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_empty_workflow() {
        let workflow = Workflow::new();
        let err = validate_workflow(&workflow).unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn test_duplicate_ids() {
        let workflow = Workflow::from_steps(vec![step("same_id"), step("same_id")]);
        assert!(matches!(
            validate_workflow(&workflow),
            Err(SchedulerError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_next_fails_fast() {
        let workflow = Workflow::from_steps(vec![step("step1").then("ghost")]);
        let err = validate_workflow(&workflow).unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
        assert!(err.to_string().contains("unknown step 'ghost'"));
    }

    #[test]
    fn test_self_next_fails_fast() {
        let workflow = Workflow::from_steps(vec![step("loop").then("loop")]);
        let err = validate_workflow(&workflow).unwrap_err();
        assert!(err.to_string().contains("names itself"));
    }

    #[test]
    fn test_cyclic_dependency() {
        let workflow = Workflow::from_steps(vec![
            step("a").requires("b_out").creates("a_out"),
            step("b").requires("a_out").creates("b_out"),
        ]);

        match validate_workflow(&workflow) {
            Err(SchedulerError::CircularDependency { ids }) => assert_eq!(ids, vec!["a", "b"]),
            other => panic!("Expected circular dependency, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_step_empty_agent() {
        let step = StepSpec::new("test", "", "code");
        let errors = validate_step(&step, &HashSet::from(["test"]));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyAgent(_))));
    }

    #[test]
    fn test_validate_step_empty_id() {
        let step = StepSpec::new("", "dev", "code");
        let errors = validate_step(&step, &HashSet::new());
        assert_eq!(errors, vec![ValidationError::EmptyStepId]);
    }

    #[test]
    fn test_validate_step_valid() {
        let step = step("good").requires("in").creates("out");
        assert!(validate_step(&step, &HashSet::from(["good"])).is_empty());
    }

    #[test]
    fn test_quick_validate_empty() {
        let errors = quick_validate(&Workflow::new());
        assert_eq!(errors, vec!["Workflow has no steps"]);
    }

    #[test]
    fn test_quick_validate_collects_everything() {
        let workflow = Workflow::from_steps(vec![
            step("a").requires("b_out").creates("a_out"),
            step("b").requires("a_out").creates("b_out"),
            step("c").requires("repo").then("ghost"),
        ]);

        let errors = quick_validate(&workflow);
        assert!(errors.iter().any(|e| e.contains("unknown step 'ghost'")));
        assert!(errors.iter().any(|e| e.contains("artifact 'repo'")));
        assert!(errors.iter().any(|e| e == "Cycle: a -> b"));
    }

    #[test]
    fn test_quick_validate_duplicates_stop_before_graph() {
        let workflow = Workflow::from_steps(vec![step("x"), step("x")]);
        let errors = quick_validate(&workflow);
        assert_eq!(errors, vec!["Duplicate step ID: 'x'"]);
    }

    #[test]
    fn test_quick_validate_valid() {
        let workflow = Workflow::from_steps(vec![
            step("a").creates("out"),
            step("b").requires("out"),
        ]);
        assert!(quick_validate(&workflow).is_empty());
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(ValidationError::EmptyWorkflow.to_string(), "Workflow has no steps");

        let err = ValidationError::DuplicateStepId("test".to_string());
        assert!(err.to_string().contains("test"));

        let err = ValidationError::InvalidReference {
            step: "a".to_string(),
            reference: "b".to_string(),
        };
        assert_eq!(err.to_string(), "Step 'a' references unknown step 'b'");
    }
}
