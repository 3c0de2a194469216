//! Artifact generation: one decision document and one plan document sharing
//! an identifier and creation time.

mod decision;
mod plan;

pub use decision::{DecisionDocument, DecisionVerdict};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::PipelineResult;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The generated artifact pair. Either both documents exist or generation
/// failed as a whole.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Decision document, pretty-printed JSON.
    pub decision_json: String,
    /// Plan document, markdown.
    pub plan_markdown: String,
}

/// RFC-3339 in UTC with a trailing `Z`, second precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Generate both artifacts from a completed pipeline run. A fresh identifier
/// and timestamp are assigned once and shared.
pub fn generate(result: &PipelineResult) -> Result<Artifacts, ArtifactError> {
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    let decision_json = decision::render(&result.input, &result.verdict, id, created_at)?;
    let plan_markdown = plan::render(&result.verdict, &result.execution, id, created_at);

    Ok(Artifacts {
        id,
        created_at,
        decision_json,
        plan_markdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecutionOutput, Phase, RejectedOption, VerdictOutput};
    use std::time::Duration;

    fn sample_result() -> PipelineResult {
        PipelineResult {
            input: "Should I use Go or Python for a web service?".to_string(),
            verdict: VerdictOutput {
                ruling: "Use Go".to_string(),
                rationale: "Static binaries and a small runtime fit the deployment target."
                    .to_string(),
                rejected: vec![RejectedOption {
                    option: "Python".to_string(),
                    reason: "Slower cold starts".to_string(),
                }],
                ranking: None,
            },
            execution: ExecutionOutput {
                mvp_scope: vec!["Define routes".to_string()],
                phases: vec![Phase {
                    name: "Setup".to_string(),
                    tasks: vec!["init repo".to_string()],
                }],
                done_criteria: vec!["service responds to /health".to_string()],
            },
            duration: Duration::from_millis(1200),
        }
    }

    #[test]
    fn test_artifacts_share_id_and_timestamp() {
        let artifacts = generate(&sample_result()).expect("generate");
        let document: DecisionDocument =
            serde_json::from_str(&artifacts.decision_json).expect("parse decision");
        assert_eq!(document.id, artifacts.id.to_string());
        assert_eq!(document.created_at, format_timestamp(artifacts.created_at));
        assert!(artifacts
            .plan_markdown
            .contains(&format!("Decision ID: {}", artifacts.id)));
        assert!(artifacts
            .plan_markdown
            .contains(&format!("Generated: {}", format_timestamp(artifacts.created_at))));
    }

    #[test]
    fn test_two_runs_produce_distinct_identifiers() {
        let result = sample_result();
        let first = generate(&result).expect("first");
        let second = generate(&result).expect("second");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_timestamp_is_utc_with_z_suffix() {
        let artifacts = generate(&sample_result()).expect("generate");
        let rendered = format_timestamp(artifacts.created_at);
        assert!(rendered.ends_with('Z'));
        let parsed = chrono::DateTime::parse_from_rfc3339(&rendered).expect("round-trip");
        assert_eq!(
            parsed.timestamp(),
            artifacts.created_at.timestamp(),
            "created_at must round-trip through RFC-3339"
        );
    }
}
