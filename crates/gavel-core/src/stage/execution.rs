//! Execution stage: turn a validated verdict into a minimal plan.

use std::sync::Arc;

use tracing::debug;

use crate::context::RequestContext;
use crate::llm::{complete_json, LlmClient, LlmError};
use crate::types::{ExecutionOutput, VerdictOutput};

/// Execution planning over any [`LlmClient`].
pub struct ExecutionStage {
    client: Arc<dyn LlmClient>,
}

impl ExecutionStage {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Produce a minimal execution plan for an already-validated verdict.
    /// Numeric bounds are enforced by the orchestrator.
    pub async fn plan(
        &self,
        ctx: &RequestContext,
        verdict: &VerdictOutput,
    ) -> Result<ExecutionOutput, LlmError> {
        let prompt = build_prompt(verdict);
        debug!(prompt_len = prompt.len(), "requesting execution plan");
        complete_json(self.client.as_ref(), ctx, &prompt).await
    }
}

fn build_prompt(verdict: &VerdictOutput) -> String {
    format!(
        r#"You are an executor, not a planner. Your role is to accept the ruling and produce a MINIMAL execution plan.

CRITICAL RULES:
1. Accept the ruling without question - you CANNOT dispute or modify it
2. Define MINIMUM viable scope only - not exhaustive features
3. Break into concrete, checkable tasks that can be completed in < 1 day
4. Maximum 3 phases, maximum 5 tasks per phase
5. Output ONLY valid JSON matching the schema - no explanations
6. Never suggest alternatives to the ruling
7. All done criteria must be measurable and verifiable

THE RULING (MUST ACCEPT):
{ruling}

RATIONALE:
{rationale}

Your task: Create a MINIMAL execution plan that implements ONLY what the ruling specifies.

Output JSON schema:
{{
  "mvp_scope": ["minimal feature 1", "minimal feature 2"],
  "phases": [
    {{
      "name": "Phase name",
      "tasks": ["concrete task 1", "concrete task 2"]
    }}
  ],
  "done_criteria": ["measurable criterion 1", "measurable criterion 2"]
}}

Focus on the absolute minimum needed to fulfill the ruling. Do not expand scope.
Output ONLY the JSON, nothing else."#,
        ruling = verdict.ruling,
        rationale = verdict.rationale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_ruling_and_rationale() {
        let verdict = VerdictOutput {
            ruling: "Use Go".to_string(),
            rationale: "Fast and simple".to_string(),
            rejected: Vec::new(),
            ranking: None,
        };
        let prompt = build_prompt(&verdict);
        assert!(prompt.contains("THE RULING (MUST ACCEPT):\nUse Go"));
        assert!(prompt.contains("RATIONALE:\nFast and simple"));
        assert!(prompt.contains("Maximum 3 phases, maximum 5 tasks per phase"));
    }
}
