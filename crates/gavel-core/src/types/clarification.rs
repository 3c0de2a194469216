//! Clarification triage outcome.

/// Result of the pre-verdict triage: either proceed, or ask the user a short
/// list of concrete questions first.
#[derive(Debug, Clone, PartialEq)]
pub enum ClarificationOutcome {
    NotNeeded,
    Needed {
        reason: String,
        questions: Vec<Question>,
    },
}

/// A clarifying question presented to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// Stable identifier referenced by the user's answers (`q1`, `q2`, ...).
    pub id: String,
    pub question: String,
    pub kind: QuestionKind,
    pub required: bool,
}

/// How the question is answered. Choice kinds always carry their options.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionKind {
    Text,
    Choice { options: Vec<String> },
    MultiChoice { options: Vec<String> },
}

impl QuestionKind {
    /// Wire label used by the HTTP surface and the LLM contract.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::Choice { .. } => "choice",
            QuestionKind::MultiChoice { .. } => "multiple_choice",
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            QuestionKind::Text => None,
            QuestionKind::Choice { options } | QuestionKind::MultiChoice { options } => {
                Some(options)
            }
        }
    }
}
