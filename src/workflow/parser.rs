//! Workflow Parser
//!
//! Handles loading and saving workflow definitions as YAML files.
//! Dependencies are never read from the file; they are derived from
//! artifacts and `next` pointers when the graph is built.

use std::fs;
use std::path::Path;

use log::{debug, info};

use super::model::Workflow;
use super::validator::validate_workflow;
use crate::error::{Result, SchedulerError};
use crate::scheduler::DependencyGraph;

/// Loads and validates a workflow from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Runs the fail-fast structural validation
///
/// # Example
///
/// ```rust,no_run
/// use agentflow::workflow::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow("feature.yaml")?;
///     println!("Loaded {} steps", workflow.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow> {
    load_workflow_graph(path).map(|(workflow, _)| workflow)
}

/// Loads and validates a workflow, keeping the graph validation built.
pub fn load_workflow_graph(path: impl AsRef<Path>) -> Result<(Workflow, DependencyGraph)> {
    let workflow = read_workflow(path)?;
    let graph = validate_workflow(&workflow)?;
    Ok((workflow, graph))
}

/// Reads and parses a workflow file without validating it.
pub fn read_workflow(path: impl AsRef<Path>) -> Result<Workflow> {
    let path = path.as_ref();
    info!("Loading workflow from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|source| SchedulerError::Io {
        path: path.display().to_string(),
        source,
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    parse_workflow(&yaml_content)
}

/// Parses a workflow from YAML text without validating it.
pub fn parse_workflow(yaml: &str) -> Result<Workflow> {
    let workflow: Workflow = serde_yaml::from_str(yaml)?;

    info!(
        "Parsed {} steps, {} agents",
        workflow.steps.len(),
        workflow.agents().len()
    );

    Ok(workflow)
}

/// Saves a workflow to a YAML file.
pub fn save_workflow(workflow: &Workflow, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let yaml_content = serde_yaml::to_string(workflow)?;
    fs::write(path, yaml_content).map_err(|source| SchedulerError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!("Saved workflow to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepSpec;
    use tempfile::tempdir;

    const DIAMOND_YAML: &str = r#"
name: diamond
steps:
  - id: step1
    agent: analyst
    action: collect
    creates: req
  - id: step2a
    agent: architect
    action: plan
    requires: req
    creates: plan1
  - id: step2b
    agent: designer
    action: design
    requires: [req]
    creates: [design]
    can_run_parallel: true
  - id: step3
    agent: dev
    action: implement
    requires: [plan1, design]
    next: step4
  - id: step4
    agent: reviewer
    action: review
    required_for_workflow: false
"#;

    #[test]
    fn test_parse_workflow() {
        let workflow = parse_workflow(DIAMOND_YAML).unwrap();

        assert_eq!(workflow.name.as_deref(), Some("diamond"));
        assert_eq!(workflow.len(), 5);

        let step2b = workflow.get_step("step2b").unwrap();
        assert!(step2b.can_run_parallel);
        assert!(step2b.requires.contains("req"));

        let step3 = workflow.get_step("step3").unwrap();
        assert_eq!(step3.requires.len(), 2);
        assert_eq!(step3.next.as_deref(), Some("step4"));

        assert!(!workflow.get_step("step4").unwrap().required_for_workflow);
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = parse_workflow("steps: [unclosed");
        assert!(matches!(result, Err(SchedulerError::Parse(_))));
    }

    #[test]
    fn test_parse_missing_id() {
        let result = parse_workflow("steps:\n  - agent: dev\n    action: code\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_workflow_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("diamond.yaml");
        fs::write(&path, DIAMOND_YAML).unwrap();

        let workflow = load_workflow(&path).unwrap();
        assert_eq!(workflow.len(), 5);
    }

    #[test]
    fn test_load_workflow_missing_file() {
        let result = load_workflow("/nonexistent/path/workflow.yaml");
        match result {
            Err(SchedulerError::Io { path, .. }) => assert!(path.contains("workflow.yaml")),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_workflow_rejects_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cycle.yaml");
        fs::write(
            &path,
            "steps:\n  - {id: a, agent: x, action: y, requires: b_out, creates: a_out}\n  - {id: b, agent: x, action: y, requires: a_out, creates: b_out}\n",
        )
        .unwrap();

        let result = load_workflow(&path);
        assert!(matches!(
            result,
            Err(SchedulerError::CircularDependency { .. })
        ));

        // Reading alone does not validate
        assert_eq!(read_workflow(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_load_workflow_graph() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("diamond.yaml");
        fs::write(&path, DIAMOND_YAML).unwrap();

        let (workflow, graph) = load_workflow_graph(&path).unwrap();
        assert_eq!(graph.len(), workflow.len());
        assert_eq!(graph.get_dependencies("step4").len(), 1);
        assert_eq!(graph.get_dependents("step1").len(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.yaml");

        let mut workflow = Workflow::from_steps(vec![
            StepSpec::new("collect", "analyst", "gather").creates("requirements"),
            StepSpec::new("plan", "architect", "draft")
                .requires("requirements")
                .required(false),
        ]);
        workflow.name = Some("saved".to_string());

        save_workflow(&workflow, &path).unwrap();
        let loaded = load_workflow(&path).unwrap();

        assert_eq!(loaded.name.as_deref(), Some("saved"));
        assert_eq!(loaded.steps, workflow.steps);
    }
}
