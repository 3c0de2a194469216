//! The multi-stage decision pipeline.
//!
//! Sequences clarification triage, optional web search, verdict and
//! execution planning under a single deadline, validates each stage's
//! structured output, and classifies failures so the HTTP surface can map
//! them without string-matching.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::{ContextError, RequestContext};
use crate::llm::{LlmClient, LlmError};
use crate::search::SearchClient;
use crate::stage::{ClarificationStage, ExecutionStage, VerdictStage};
use crate::types::{ClarificationOutcome, ExecutionOutput, Question, VerdictOutput};

/// Inputs longer than this many codepoints are rejected before any LLM call.
pub const MAX_INPUT_CHARS: usize = 10_000;

/// Deadline applied to the entire request when none is configured.
pub const DEFAULT_PIPELINE_TIMEOUT: Duration = Duration::from_secs(600);

/// Search hits requested from the gateway per pipeline run.
pub const DEFAULT_SEARCH_RESULTS: usize = 5;

/// Terminal pipeline failures, ordered for classification: the context state
/// dominates, then the failing stage identifies the wrapper.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input is empty")]
    InputEmpty,
    #[error("input exceeds 10000 characters")]
    InputTooLong,
    #[error("verdict stage failed: {0}")]
    VerdictFailed(String),
    #[error("execution stage failed: {0}")]
    ExecutionFailed(String),
    #[error("pipeline timeout")]
    Timeout,
    #[error("pipeline cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

/// One pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub input: String,
    /// Answers to a previous clarification round, keyed by question id.
    pub answers: Option<BTreeMap<String, String>>,
    /// Skip the clarification triage even when the stage is enabled.
    pub skip_clarify: bool,
}

impl PipelineRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            answers: None,
            skip_clarify: false,
        }
    }
}

/// Successful pipeline terminations.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Terminal success branch: the user must answer questions first.
    ClarificationNeeded {
        reason: String,
        questions: Vec<Question>,
    },
    Completed(PipelineResult),
}

/// In-memory aggregate of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub input: String,
    pub verdict: VerdictOutput,
    pub execution: ExecutionOutput,
    pub duration: Duration,
}

enum StageKind {
    Verdict,
    Execution,
}

/// Deterministic orchestrator over the three stages. Safe to share across
/// concurrent callers: all per-call state lives on the stack.
pub struct Pipeline {
    clarification: Option<ClarificationStage>,
    verdict: VerdictStage,
    execution: ExecutionStage,
    search: Option<Arc<dyn SearchClient>>,
    timeout: Duration,
    max_search_results: usize,
}

impl Pipeline {
    /// Build a pipeline with clarification enabled and no search gateway.
    /// A zero timeout selects [`DEFAULT_PIPELINE_TIMEOUT`].
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            DEFAULT_PIPELINE_TIMEOUT
        } else {
            timeout
        };
        Self {
            clarification: Some(ClarificationStage::new(llm.clone())),
            verdict: VerdictStage::new(llm.clone()),
            execution: ExecutionStage::new(llm),
            search: None,
            timeout,
            max_search_results: DEFAULT_SEARCH_RESULTS,
        }
    }

    /// Enrich verdict prompts with best-effort web search context.
    pub fn with_search(mut self, client: Arc<dyn SearchClient>) -> Self {
        self.search = Some(client);
        self
    }

    /// Disable the clarification triage entirely.
    pub fn without_clarification(mut self) -> Self {
        self.clarification = None;
        self
    }

    /// Run the full pipeline for one request.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        request: PipelineRequest,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let ctx = ctx.child_with_timeout(self.timeout);

        let input = request.input.trim().to_string();
        if input.is_empty() {
            return Err(PipelineError::InputEmpty);
        }
        if input.chars().count() > MAX_INPUT_CHARS {
            return Err(PipelineError::InputTooLong);
        }
        ctx.check().map_err(classify_ctx)?;

        if let Some(stage) = &self.clarification {
            if request.answers.is_none() && !request.skip_clarify {
                match stage.analyze(&ctx, &input).await {
                    Ok(ClarificationOutcome::Needed { reason, questions }) => {
                        info!(
                            question_count = questions.len(),
                            "clarification needed, returning questions"
                        );
                        return Ok(PipelineOutcome::ClarificationNeeded { reason, questions });
                    }
                    Ok(ClarificationOutcome::NotNeeded) => {
                        debug!("clarification not needed");
                    }
                    Err(err) => {
                        ctx.check().map_err(classify_ctx)?;
                        warn!(error = %err, "clarification stage failed, proceeding without questions");
                    }
                }
            }
        }

        let input = match &request.answers {
            Some(answers) if !answers.is_empty() => enrich_input(&input, answers),
            _ => input,
        };

        let search_context = match &self.search {
            Some(client) => {
                match client.search(&ctx, &input, self.max_search_results).await {
                    Ok(results) if results.results.is_empty() => {
                        debug!(query = %results.query, "search returned no results");
                        None
                    }
                    Ok(results) => {
                        debug!(result_count = results.results.len(), "search context attached");
                        Some(results.format_for_prompt())
                    }
                    Err(err) => {
                        ctx.check().map_err(classify_ctx)?;
                        warn!(error = %err, "search failed, proceeding without web context");
                        None
                    }
                }
            }
            None => None,
        };

        let verdict = self
            .verdict
            .judge(&ctx, &input, search_context.as_deref())
            .await
            .map_err(|e| classify_stage(&ctx, StageKind::Verdict, e))?;
        validate_verdict(&verdict).map_err(PipelineError::VerdictFailed)?;

        let execution = self
            .execution
            .plan(&ctx, &verdict)
            .await
            .map_err(|e| classify_stage(&ctx, StageKind::Execution, e))?;
        validate_execution(&execution).map_err(PipelineError::ExecutionFailed)?;

        let duration = started.elapsed();
        info!(
            duration_ms = duration.as_millis() as u64,
            phase_count = execution.phases.len(),
            "pipeline completed"
        );
        Ok(PipelineOutcome::Completed(PipelineResult {
            input,
            verdict,
            execution,
            duration,
        }))
    }
}

/// Append clarification answers to the original input, one line per answer.
/// Answers are ordered by question id for deterministic prompts.
fn enrich_input(input: &str, answers: &BTreeMap<String, String>) -> String {
    let mut out = String::from(input);
    out.push_str("\n\n--- 用户补充信息 / User Clarifications ---\n");
    for (id, answer) in answers {
        out.push_str("- ");
        out.push_str(id);
        out.push_str(": ");
        out.push_str(answer);
        out.push('\n');
    }
    out
}

fn classify_ctx(err: ContextError) -> PipelineError {
    match err {
        ContextError::DeadlineExceeded => PipelineError::Timeout,
        ContextError::Cancelled => PipelineError::Cancelled,
    }
}

fn classify_stage(ctx: &RequestContext, stage: StageKind, err: LlmError) -> PipelineError {
    if ctx.deadline_exceeded() {
        return PipelineError::Timeout;
    }
    if ctx.is_cancelled() || matches!(err, LlmError::Cancelled) {
        return PipelineError::Cancelled;
    }
    match stage {
        StageKind::Verdict => PipelineError::VerdictFailed(err.to_string()),
        StageKind::Execution => PipelineError::ExecutionFailed(err.to_string()),
    }
}

fn validate_verdict(verdict: &VerdictOutput) -> Result<(), String> {
    if verdict.ruling.trim().is_empty() {
        return Err("verdict ruling is empty".to_string());
    }
    if verdict.rationale.trim().is_empty() {
        return Err("verdict rationale is empty".to_string());
    }
    Ok(())
}

fn validate_execution(execution: &ExecutionOutput) -> Result<(), String> {
    if execution.mvp_scope.is_empty() {
        return Err("no MVP scope defined".to_string());
    }
    if execution.mvp_scope.iter().any(|s| s.trim().is_empty()) {
        return Err("MVP scope contains an empty item".to_string());
    }
    if execution.phases.is_empty() {
        return Err("no phases defined".to_string());
    }
    if execution.phases.len() > 3 {
        return Err(format!(
            "too many phases: {} (maximum 3)",
            execution.phases.len()
        ));
    }
    for (index, phase) in execution.phases.iter().enumerate() {
        if phase.name.trim().is_empty() {
            return Err(format!("phase {} has no name", index + 1));
        }
        if phase.tasks.is_empty() {
            return Err(format!("phase {} has no tasks", index + 1));
        }
        if phase.tasks.len() > 5 {
            return Err(format!(
                "phase {} has too many tasks: {} (maximum 5)",
                index + 1,
                phase.tasks.len()
            ));
        }
        if phase.tasks.iter().any(|t| t.trim().is_empty()) {
            return Err(format!("phase {} has an empty task", index + 1));
        }
    }
    if execution.done_criteria.is_empty() {
        return Err("no done criteria defined".to_string());
    }
    if execution.done_criteria.iter().any(|c| c.trim().is_empty()) {
        return Err("done criteria contains an empty item".to_string());
    }
    Ok(())
}
