//! Verdict payload produced by the verdict stage.

use serde::{Deserialize, Serialize};

/// The singular ruling together with its justification and the alternatives
/// that were considered and discarded.
///
/// Fields are defaulted on deserialization: a structurally valid but
/// incomplete payload parses, and the orchestrator's validation rejects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictOutput {
    #[serde(default)]
    pub ruling: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub rejected: Vec<RejectedOption>,
    /// Optional ranking over the considered options, best first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Vec<u32>>,
}

/// An alternative the verdict explicitly rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedOption {
    pub option: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_defaults_to_empty() {
        let verdict: VerdictOutput =
            serde_json::from_str(r#"{"ruling":"Use Go","rationale":"fits"}"#).expect("parse");
        assert!(verdict.rejected.is_empty());
        assert!(verdict.ranking.is_none());
    }

    #[test]
    fn test_ranking_is_omitted_when_absent() {
        let verdict = VerdictOutput {
            ruling: "Use Go".to_string(),
            rationale: "fits".to_string(),
            rejected: Vec::new(),
            ranking: None,
        };
        let json = serde_json::to_value(&verdict).expect("serialize");
        assert!(json.get("ranking").is_none());
        assert_eq!(json["rejected"], serde_json::json!([]));
    }
}
