//! Plan document rendering.
//!
//! The markdown layout is an external contract: callers render and parse it.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::format_timestamp;
use crate::types::{ExecutionOutput, VerdictOutput};

pub(super) fn render(
    verdict: &VerdictOutput,
    execution: &ExecutionOutput,
    id: Uuid,
    created_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Execution Plan: {}", verdict.ruling);
    let _ = writeln!(out, "Generated: {}", format_timestamp(created_at));
    let _ = writeln!(out, "Decision ID: {}", id);
    let _ = writeln!(out);

    let _ = writeln!(out, "## MVP Scope");
    for item in &execution.mvp_scope {
        let _ = writeln!(out, "- {item}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Phases");
    for (index, phase) in execution.phases.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "### Phase {}: {}", index + 1, phase.name);
        for task in &phase.tasks {
            let _ = writeln!(out, "- [ ] {task}");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Done Criteria");
    for criterion in &execution.done_criteria {
        let _ = writeln!(out, "- {criterion}");
    }
    out
}
