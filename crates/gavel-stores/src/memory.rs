//! In-memory repository for development and testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use gavel_core::context::RequestContext;
use gavel_core::store::{DecisionRecord, PlanRecord, Repository, StoreError};

/// Both maps live behind one lock so `save_artifacts` commits the pair in a
/// single swap with no observable intermediate state. The lock is never held
/// across an await point.
#[derive(Default)]
struct MemoryState {
    decisions: HashMap<Uuid, DecisionRecord>,
    plans: HashMap<Uuid, PlanRecord>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<MemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no artifact pair has been committed. Used by tests to
    /// assert that failed pipelines persist nothing.
    pub fn is_empty(&self) -> bool {
        self.state
            .read()
            .map(|state| state.decisions.is_empty() && state.plans.is_empty())
            .unwrap_or(true)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save_artifacts(
        &self,
        ctx: &RequestContext,
        decision: &DecisionRecord,
        plan: &PlanRecord,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        let mut state = self
            .state
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        if state.decisions.contains_key(&decision.id) || state.plans.contains_key(&plan.id) {
            return Err(StoreError::Conflict);
        }

        let mut plan = plan.clone();
        plan.decision_id = decision.id;
        state.decisions.insert(decision.id, decision.clone());
        state.plans.insert(plan.id, plan);
        Ok(())
    }

    async fn get_decision(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<DecisionRecord, StoreError> {
        ctx.check()?;
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        state.decisions.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_plan(&self, ctx: &RequestContext, id: Uuid) -> Result<PlanRecord, StoreError> {
        ctx.check()?;
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        state.plans.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_plan_by_decision(
        &self,
        ctx: &RequestContext,
        decision_id: Uuid,
    ) -> Result<PlanRecord, StoreError> {
        ctx.check()?;
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        state
            .plans
            .values()
            .find(|plan| plan.decision_id == decision_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        ctx.check()?;
        Ok(())
    }

    async fn close(&self) {}
}
