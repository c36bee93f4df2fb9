//! Workflow Definition Module
//!
//! Data structures and utilities for defining, parsing and validating
//! agent workflows.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (StepSpec, Workflow)
//! - [`parser`]: YAML loading and saving
//! - [`validator`]: Fail-fast structural checks

pub mod model;
pub mod parser;
pub mod validator;

pub use model::{StepSpec, Workflow};
pub use parser::{load_workflow, load_workflow_graph, parse_workflow, read_workflow, save_workflow};
pub use validator::{quick_validate, validate_workflow, ValidationError};
