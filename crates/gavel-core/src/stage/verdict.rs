//! Verdict stage: one ruling, explicit rejections, no hedging.

use std::sync::Arc;

use tracing::debug;

use crate::context::RequestContext;
use crate::llm::{complete_json, LlmClient, LlmError};
use crate::stage::{detect_language, Lang};
use crate::types::VerdictOutput;

const VERDICT_PROMPT_ZH: &str = r#"你是一位法官，不是顾问。你的职责是做出单一、明确的裁决，而不是提供选项或建议。

核心原则：
1. 只给出一个裁决——绝不提供替代方案
2. 明确拒绝其他选项并说明理由
3. 绝不使用"你也可以"、"这取决于"、"另一个选择"等表述
4. 输出必须是有效的 JSON 格式
5. 如果提供了网络搜索结果，优先使用最新信息做出判断

输出格式（严格遵守）：
{
  "ruling": "你的唯一裁决",
  "rationale": "为什么这是正确的选择",
  "rejected": [
    {"option": "被拒绝的选项1", "reason": "拒绝的具体原因"},
    {"option": "被拒绝的选项2", "reason": "拒绝的具体原因"}
  ]
}

要求：
- ruling: 清晰、果断、可执行的单一决定
- rationale: 简洁有力的理由（2-3句话）
- rejected: 至少列出2个被拒绝的替代方案（如果适用）

严禁：
- 使用模糊语言
- 提供多个选项让用户选择
- 建议"根据情况而定"
- 在裁决中使用"可能"、"也许"等词

"#;

const VERDICT_PROMPT_EN: &str = r#"You are a judge, not a consultant. Your role is to deliver a SINGLE, DEFINITIVE ruling—not to offer options or suggestions.

Core Principles:
1. Deliver ONE ruling—no alternatives
2. Explicitly reject other options with reasons
3. Never use phrases like "you could also", "it depends", "another option would be"
4. Output ONLY valid JSON matching the schema
5. If web search results are provided, prioritize using the latest information

Output Format (strict adherence required):
{
  "ruling": "Your singular verdict",
  "rationale": "Why this is the correct choice",
  "rejected": [
    {"option": "Rejected option 1", "reason": "Specific reason for rejection"},
    {"option": "Rejected option 2", "reason": "Specific reason for rejection"}
  ]
}

Requirements:
- ruling: Clear, decisive, actionable single decision
- rationale: Concise, powerful reasoning (2-3 sentences)
- rejected: List at least 2 rejected alternatives (if applicable)

Prohibited:
- Hedging language
- Providing multiple options for user to choose from
- Suggesting "it depends on the situation"
- Using "maybe", "possibly", "could" in the ruling

"#;

/// Verdict production over any [`LlmClient`].
pub struct VerdictStage {
    client: Arc<dyn LlmClient>,
}

impl VerdictStage {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Deliver a verdict for `input`, optionally grounded in a pre-formatted
    /// web-search fragment. Structural validation is the orchestrator's job.
    pub async fn judge(
        &self,
        ctx: &RequestContext,
        input: &str,
        search_context: Option<&str>,
    ) -> Result<VerdictOutput, LlmError> {
        let prompt = build_prompt(input, search_context);
        debug!(
            prompt_len = prompt.len(),
            with_search = search_context.is_some(),
            "requesting verdict"
        );
        complete_json(self.client.as_ref(), ctx, &prompt).await
    }
}

/// The search fragment, when present, sits immediately before the user input
/// with the instruction to prioritize the newer facts.
fn build_prompt(input: &str, search_context: Option<&str>) -> String {
    let mut prompt = String::new();
    match detect_language(input) {
        Lang::Zh => {
            prompt.push_str(VERDICT_PROMPT_ZH);
            if let Some(context) = search_context {
                prompt.push_str("以下是与问题相关的最新网络搜索结果，请基于这些信息做出判断：\n\n");
                prompt.push_str(context);
                prompt.push_str("\n\n");
            }
            prompt.push_str("现在，基于以下输入做出裁决：\n\n");
        }
        Lang::En => {
            prompt.push_str(VERDICT_PROMPT_EN);
            if let Some(context) = search_context {
                prompt.push_str(
                    "The following are recent web search results relevant to the query. Use this information to make your judgment:\n\n",
                );
                prompt.push_str(context);
                prompt.push_str("\n\n");
            }
            prompt.push_str("Now, deliver your verdict based on the following input:\n\n");
        }
    }
    prompt.push_str(input);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_ends_with_input() {
        let prompt = build_prompt("Go or Python?", None);
        assert!(prompt.starts_with("You are a judge"));
        assert!(prompt.ends_with("Go or Python?"));
        assert!(!prompt.contains("web search results relevant"));
    }

    #[test]
    fn test_search_fragment_sits_before_input() {
        let prompt = build_prompt("Go or Python?", Some("## Web Search Results for: Go or Python?"));
        let fragment = prompt
            .find("## Web Search Results")
            .expect("fragment present");
        let input = prompt.rfind("Go or Python?").expect("input present");
        assert!(fragment < input);
        assert!(prompt.contains("prioritize using the latest information"));
    }

    #[test]
    fn test_chinese_prompt_for_chinese_input() {
        let prompt = build_prompt("我该选哪个数据库？", None);
        assert!(prompt.starts_with("你是一位法官"));
        assert!(prompt.ends_with("我该选哪个数据库？"));
    }
}
