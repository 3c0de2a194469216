//! Repository port: transactional persistence for the artifact pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::context::{ContextError, RequestContext};

/// A stored decision with its verdict payload.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub input: String,
    /// Verdict payload (ruling, rationale, rejected, ranking) as JSON.
    pub verdict: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub is_final: bool,
}

/// A stored plan linked to its decision. The plan shares the artifact pair's
/// identifier.
#[derive(Debug, Clone)]
pub struct PlanRecord {
    pub id: Uuid,
    pub decision_id: Uuid,
    /// Plan document markdown.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Store failure kinds.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate identifier")]
    Conflict,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ContextError> for StoreError {
    fn from(err: ContextError) -> Self {
        StoreError::Internal(err.to_string())
    }
}

/// Provider-agnostic persistence for the artifact pair.
///
/// `save_artifacts` is atomic: either both records are committed or neither
/// is, and the plan's `decision_id` is stamped to the decision's id before
/// commit. Implementations must be safe for concurrent use.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn save_artifacts(
        &self,
        ctx: &RequestContext,
        decision: &DecisionRecord,
        plan: &PlanRecord,
    ) -> Result<(), StoreError>;

    async fn get_decision(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<DecisionRecord, StoreError>;

    async fn get_plan(&self, ctx: &RequestContext, id: Uuid) -> Result<PlanRecord, StoreError>;

    async fn get_plan_by_decision(
        &self,
        ctx: &RequestContext,
        decision_id: Uuid,
    ) -> Result<PlanRecord, StoreError>;

    /// Health probe; any failure means "degraded".
    async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError>;

    /// Release held resources. Further calls may fail.
    async fn close(&self);
}
