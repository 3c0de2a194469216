//! Decision document rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{format_timestamp, ArtifactError};
use crate::types::{RejectedOption, VerdictOutput};

/// The immutable decision record as rendered to callers and parsed back by
/// them. `rejected` is always a list, never null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionDocument {
    pub id: String,
    pub created_at: String,
    pub input: String,
    pub verdict: DecisionVerdict,
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionVerdict {
    pub ruling: String,
    pub rationale: String,
    #[serde(default)]
    pub rejected: Vec<RejectedOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Vec<u32>>,
}

pub(super) fn render(
    input: &str,
    verdict: &VerdictOutput,
    id: Uuid,
    created_at: DateTime<Utc>,
) -> Result<String, ArtifactError> {
    let document = DecisionDocument {
        id: id.to_string(),
        created_at: format_timestamp(created_at),
        input: input.to_string(),
        verdict: DecisionVerdict {
            ruling: verdict.ruling.clone(),
            rationale: verdict.rationale.clone(),
            rejected: verdict.rejected.clone(),
            ranking: verdict.ranking.clone(),
        },
        is_final: true,
    };
    serde_json::to_string_pretty(&document).map_err(|e| ArtifactError::Serialization(e.to_string()))
}
