//! Execution plan produced by the execution stage.

use serde::{Deserialize, Serialize};

/// Minimal execution plan: MVP scope, at most three phases of at most five
/// tasks each, and measurable completion criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    #[serde(default)]
    pub mvp_scope: Vec<String>,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub done_criteria: Vec<String>,
}

/// A named, ordered grouping of tasks within the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<String>,
}
