//! Clarification triage stage.
//!
//! Decides whether the input is too ambiguous or leans on evolving/personal
//! facts, and if so emits 2-4 typed questions for the user.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::llm::{complete_json, LlmClient, LlmError};
use crate::stage::{detect_language, Lang};
use crate::types::{ClarificationOutcome, Question, QuestionKind};

const CLARIFICATION_PROMPT_ZH: &str = r#"你是一位信息分析专家。分析用户输入，判断是否需要更多上下文信息才能做出准确决策。

判断标准：
1. 输入是否涉及具体的个人情况（账号、订阅、设备等）？
2. 输入是否涉及实时变化的信息（政策、价格、流程等）？
3. 输入是否有多种可能的解读？
4. 是否缺少关键的约束条件（预算、时间、技术水平等）？

如果需要澄清，生成2-4个简洁、关键的问题。

输出格式（严格遵守JSON）：
{
  "needs_clarification": true/false,
  "reason": "为什么需要/不需要澄清",
  "questions": [
    {
      "id": "q1",
      "question": "问题内容",
      "type": "text/choice/multiple_choice",
      "options": ["选项1", "选项2"],
      "required": true/false
    }
  ]
}

如果不需要澄清，questions 数组为空。

分析以下输入：

"#;

const CLARIFICATION_PROMPT_EN: &str = r#"You are an information analyst. Analyze the user input to determine if more context is needed for an accurate decision.

Criteria for clarification:
1. Does the input involve specific personal situations (accounts, subscriptions, devices)?
2. Does it involve real-time changing information (policies, prices, procedures)?
3. Are there multiple possible interpretations?
4. Are key constraints missing (budget, time, skill level)?

If clarification is needed, generate 2-4 concise, critical questions.

Output Format (strict JSON):
{
  "needs_clarification": true/false,
  "reason": "Why clarification is/isn't needed",
  "questions": [
    {
      "id": "q1",
      "question": "Question content",
      "type": "text/choice/multiple_choice",
      "options": ["Option 1", "Option 2"],
      "required": true/false
    }
  ]
}

If no clarification needed, questions array should be empty.

Analyze the following input:

"#;

/// Raw wire shape returned by the LLM before normalization. Optional fields
/// tolerate explicit nulls as well as omission.
#[derive(Debug, Deserialize)]
struct RawClarification {
    needs_clarification: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    question: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    required: bool,
}

/// Clarification triage over any [`LlmClient`].
pub struct ClarificationStage {
    client: Arc<dyn LlmClient>,
}

impl ClarificationStage {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Ask the model whether the input needs clarification and normalize the
    /// answer into a [`ClarificationOutcome`].
    pub async fn analyze(
        &self,
        ctx: &RequestContext,
        input: &str,
    ) -> Result<ClarificationOutcome, LlmError> {
        let prompt = build_prompt(input);
        let raw: RawClarification = complete_json(self.client.as_ref(), ctx, &prompt).await?;
        debug!(
            needs_clarification = raw.needs_clarification,
            question_count = raw.questions.as_ref().map_or(0, Vec::len),
            "clarification triage complete"
        );
        Ok(normalize(raw))
    }
}

fn build_prompt(input: &str) -> String {
    let template = match detect_language(input) {
        Lang::Zh => CLARIFICATION_PROMPT_ZH,
        Lang::En => CLARIFICATION_PROMPT_EN,
    };
    format!("{template}{input}")
}

/// Assign missing ids (`q1..qN` by position), default missing types to free
/// text, and drop choice questions that arrived without options.
fn normalize(raw: RawClarification) -> ClarificationOutcome {
    if !raw.needs_clarification {
        return ClarificationOutcome::NotNeeded;
    }

    let raw_questions = raw.questions.unwrap_or_default();
    let mut questions = Vec::with_capacity(raw_questions.len());
    for (index, q) in raw_questions.into_iter().enumerate() {
        let id = match q.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => format!("q{}", index + 1),
        };
        let options = q.options.unwrap_or_default();
        let kind = match q.kind.as_deref() {
            None | Some("") | Some("text") => QuestionKind::Text,
            Some("choice") => {
                if options.is_empty() {
                    warn!(question = %q.question, "dropping choice question without options");
                    continue;
                }
                QuestionKind::Choice { options }
            }
            Some("multiple_choice") => {
                if options.is_empty() {
                    warn!(question = %q.question, "dropping multiple_choice question without options");
                    continue;
                }
                QuestionKind::MultiChoice { options }
            }
            Some(other) => {
                warn!(kind = %other, "unknown question type, treating as free text");
                QuestionKind::Text
            }
        };
        questions.push(Question {
            id,
            question: q.question,
            kind,
            required: q.required,
        });
    }

    if questions.is_empty() {
        return ClarificationOutcome::NotNeeded;
    }
    ClarificationOutcome::Needed {
        reason: raw.reason.unwrap_or_default(),
        questions,
    }
}
