//! Error Types
//!
//! Structural problems with a workflow definition fail fast through
//! [`SchedulerError`]. A step's own runtime failure is never an error here;
//! it is recorded as state and handled by the failure cascade.

use thiserror::Error;

/// Errors raised while loading, building or driving a workflow.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed step definition (empty or duplicate id, unknown `next`, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Steps that could not be placed in any level because they form,
    /// or are only reachable through, a dependency cycle.
    #[error("Circular dependency detected among steps: {}", ids.join(", "))]
    CircularDependency { ids: Vec<String> },

    /// A step id the graph does not know.
    #[error("Unknown step: '{0}'")]
    UnknownStep(String),

    /// A state transition out of a terminal state.
    #[error("Step '{step}' cannot move from {from} to {to}")]
    InvalidTransition {
        step: String,
        from: String,
        to: String,
    },

    #[error("I/O error on workflow file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse workflow YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The coordinator lost contact with its workers.
    #[error("Execution error: {0}")]
    Execution(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_display_lists_ids() {
        let err = SchedulerError::CircularDependency {
            ids: vec!["step1".to_string(), "step2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected among steps: step1, step2"
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = SchedulerError::InvalidTransition {
            step: "build".to_string(),
            from: "completed".to_string(),
            to: "failed".to_string(),
        };
        assert!(err.to_string().contains("build"));
        assert!(err.to_string().contains("completed"));
    }

    #[test]
    fn test_configuration_display() {
        let err = SchedulerError::Configuration("Duplicate step ID: 'a'".to_string());
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
