//! PostgreSQL repository.
//!
//! Two tables linked by `decision_id`, with JSONB storage for the verdict
//! payload. The artifact pair is committed inside one transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use gavel_core::context::RequestContext;
use gavel_core::store::{DecisionRecord, PlanRecord, Repository, StoreError};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Connect, verify the connection and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS decisions (
                id UUID PRIMARY KEY,
                input TEXT NOT NULL,
                verdict JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                is_final BOOLEAN NOT NULL DEFAULT TRUE
            )",
            "CREATE INDEX IF NOT EXISTS decisions_created_at_idx
                ON decisions (created_at DESC)",
            "CREATE TABLE IF NOT EXISTS plans (
                id UUID PRIMARY KEY,
                decision_id UUID NOT NULL REFERENCES decisions(id),
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS plans_decision_id_idx
                ON plans (decision_id)",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
        }
        debug!("postgres schema ready");
        Ok(())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict
        }
        _ => StoreError::Connection(err.to_string()),
    }
}

fn decode_decision(row: PgRow) -> Result<DecisionRecord, StoreError> {
    Ok(DecisionRecord {
        id: row
            .try_get("id")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        input: row
            .try_get("input")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        verdict: row
            .try_get("verdict")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        is_final: row
            .try_get("is_final")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
    })
}

fn decode_plan(row: PgRow) -> Result<PlanRecord, StoreError> {
    Ok(PlanRecord {
        id: row
            .try_get("id")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        decision_id: row
            .try_get("decision_id")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        content: row
            .try_get("content")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
    })
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn save_artifacts(
        &self,
        ctx: &RequestContext,
        decision: &DecisionRecord,
        plan: &PlanRecord,
    ) -> Result<(), StoreError> {
        ctx.check()?;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO decisions (id, input, verdict, created_at, is_final)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(decision.id)
        .bind(&decision.input)
        .bind(&decision.verdict)
        .bind(decision.created_at)
        .bind(decision.is_final)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO plans (id, decision_id, content, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(plan.id)
        .bind(decision.id)
        .bind(&plan.content)
        .bind(plan.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn get_decision(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<DecisionRecord, StoreError> {
        ctx.check()?;
        let row = sqlx::query(
            "SELECT id, input, verdict, created_at, is_final FROM decisions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;
        decode_decision(row)
    }

    async fn get_plan(&self, ctx: &RequestContext, id: Uuid) -> Result<PlanRecord, StoreError> {
        ctx.check()?;
        let row = sqlx::query(
            "SELECT id, decision_id, content, created_at FROM plans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;
        decode_plan(row)
    }

    async fn get_plan_by_decision(
        &self,
        ctx: &RequestContext,
        decision_id: Uuid,
    ) -> Result<PlanRecord, StoreError> {
        ctx.check()?;
        let row = sqlx::query(
            "SELECT id, decision_id, content, created_at FROM plans WHERE decision_id = $1",
        )
        .bind(decision_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;
        decode_plan(row)
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        ctx.check()?;
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pair(id: Uuid) -> (DecisionRecord, PlanRecord) {
        let created_at = Utc::now();
        (
            DecisionRecord {
                id,
                input: "Go or Python?".to_string(),
                verdict: serde_json::json!({"ruling": "Use Go", "rationale": "fits"}),
                created_at,
                is_final: true,
            },
            PlanRecord {
                id,
                decision_id: id,
                content: "# Execution Plan: Use Go\n".to_string(),
                created_at,
            },
        )
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a running postgres"]
    async fn test_live_transactional_save_and_lookup() {
        let url = match std::env::var("DATABASE_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => {
                eprintln!("skipped: DATABASE_URL is not set");
                return;
            }
        };

        let repo = PostgresRepository::connect(&url).await.expect("connect");
        let ctx = RequestContext::background();
        let id = Uuid::new_v4();
        let (decision, plan) = pair(id);

        repo.save_artifacts(&ctx, &decision, &plan)
            .await
            .expect("save");
        let stored = repo.get_decision(&ctx, id).await.expect("decision");
        assert_eq!(stored.input, decision.input);
        let stored_plan = repo.get_plan_by_decision(&ctx, id).await.expect("plan");
        assert_eq!(stored_plan.decision_id, id);

        // Duplicate pair aborts the transaction and leaves the rows as-is.
        let err = repo
            .save_artifacts(&ctx, &decision, &plan)
            .await
            .expect_err("duplicate id");
        assert!(matches!(err, StoreError::Conflict));

        repo.close().await;
    }
}
