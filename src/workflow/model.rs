//! Workflow Data Model
//!
//! Core data structures representing workflow steps and the artifacts
//! they exchange.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: feature_delivery
//! steps:
//!   - id: gather_requirements
//!     agent: analyst
//!     action: collect
//!     creates: requirements
//!
//!   - id: write_plan
//!     agent: architect
//!     action: plan
//!     requires: requirements
//!     creates: [plan, design]
//!     next: review_plan
//!
//!   - id: review_plan
//!     agent: reviewer
//!     action: review
//!     required_for_workflow: false
//! ```

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{Result, SchedulerError};

/// Declaration of a single workflow step.
///
/// Dependencies are never listed directly: a step waits on every other step
/// that creates one of the artifacts it requires, and on any step naming it
/// as `next`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    /// Unique identifier for this step
    #[serde(deserialize_with = "trimmed")]
    pub id: String,

    /// Agent that owns the work (e.g., "architect", "reviewer")
    #[serde(deserialize_with = "trimmed", default)]
    pub agent: String,

    /// Action the agent performs
    #[serde(deserialize_with = "trimmed", default)]
    pub action: String,

    /// Artifacts this step consumes
    #[serde(deserialize_with = "single_or_set", default)]
    pub requires: BTreeSet<String>,

    /// Artifacts this step produces
    #[serde(deserialize_with = "single_or_set", default)]
    pub creates: BTreeSet<String>,

    /// Step that must wait for this one, regardless of artifacts
    #[serde(
        deserialize_with = "trimmed_step_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next: Option<String>,

    /// Advisory hint for executors; ordering never depends on it
    #[serde(default)]
    pub can_run_parallel: bool,

    /// Whether a failure of this step fails the whole run
    #[serde(default = "default_required")]
    pub required_for_workflow: bool,
}

fn default_required() -> bool {
    true
}

fn trimmed<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

/// A blank `next` means no successor
fn trimmed_step_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<String>::deserialize(deserializer)?;
    Ok(id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Deserializes either a single string or array of strings into a set
fn single_or_set<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(BTreeSet::new()),
        Value::String(s) if s.trim().is_empty() => Ok(BTreeSet::new()),
        Value::String(s) => Ok(BTreeSet::from([s.trim().to_string()])),
        Value::Array(arr) => arr
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.trim().to_string()),
                _ => Err(de::Error::custom("Expected string in artifact list")),
            })
            .collect(),
        _ => Err(de::Error::custom("Expected artifact name or list of artifact names")),
    }
}

impl StepSpec {
    /// Creates a new step with no artifacts and default flags.
    ///
    /// # Example
    ///
    /// ```
    /// use agentflow::workflow::StepSpec;
    ///
    /// let step = StepSpec::new("write_plan", "architect", "plan")
    ///     .requires("requirements")
    ///     .creates("plan")
    ///     .then("review_plan");
    /// assert_eq!(step.next.as_deref(), Some("review_plan"));
    /// ```
    pub fn new(id: impl Into<String>, agent: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            agent: agent.into().trim().to_string(),
            action: action.into().trim().to_string(),
            requires: BTreeSet::new(),
            creates: BTreeSet::new(),
            next: None,
            can_run_parallel: false,
            required_for_workflow: true,
        }
    }

    /// Adds a required artifact.
    pub fn requires(mut self, artifact: impl Into<String>) -> Self {
        self.requires.insert(artifact.into());
        self
    }

    /// Adds a produced artifact.
    pub fn creates(mut self, artifact: impl Into<String>) -> Self {
        self.creates.insert(artifact.into());
        self
    }

    /// Sets the explicit successor step.
    pub fn then(mut self, step_id: impl Into<String>) -> Self {
        self.next = Some(step_id.into().trim().to_string());
        self
    }

    /// Marks the step as safe to run alongside others.
    pub fn parallel(mut self, can_run_parallel: bool) -> Self {
        self.can_run_parallel = can_run_parallel;
        self
    }

    /// Sets whether a failure of this step is critical.
    pub fn required(mut self, required: bool) -> Self {
        self.required_for_workflow = required;
        self
    }

    /// Human-readable name used in skip reasons.
    pub fn display_name(&self) -> &str {
        if self.agent.is_empty() {
            &self.action
        } else {
            &self.agent
        }
    }
}

/// A complete workflow definition.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Workflow {
    /// Optional workflow name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Steps in declaration order
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a workflow from a list of steps.
    pub fn from_steps(steps: Vec<StepSpec>) -> Self {
        Self { name: None, steps }
    }

    /// Adds a step, rejecting duplicate ids.
    pub fn add_step(&mut self, step: StepSpec) -> Result<()> {
        if self.steps.iter().any(|s| s.id == step.id) {
            return Err(SchedulerError::Configuration(format!(
                "Step '{}' already exists",
                step.id
            )));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Gets a step by ID.
    pub fn get_step(&self, id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Returns the sorted, de-duplicated list of agents used.
    pub fn agents(&self) -> Vec<String> {
        let agents: BTreeSet<_> = self
            .steps
            .iter()
            .filter(|s| !s.agent.is_empty())
            .map(|s| s.agent.clone())
            .collect();
        agents.into_iter().collect()
    }

    /// Returns the number of steps in the workflow.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the workflow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
