// PostgreSQL RunStore

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use switchyard_core::run::{NewRun, RunCompletion};
use switchyard_core::{Run, RunStore, StoreError, StoreResult};

use crate::models::RunRow;

const RUN_COLUMNS: &str = "id, event_id, agent_slug, input_payload, output_payload, tool_calls, \
     status, error_message, latency_ms, tokens_used, created_at, completed_at";

#[derive(Clone)]
pub struct PostgresRunStore {
    pool: PgPool,
}

impl PostgresRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PostgresRunStore {
    #[instrument(skip(self, input), fields(event_id = %input.event_id))]
    async fn create(&self, input: NewRun) -> StoreResult<Run> {
        let row = sqlx::query_as::<_, RunRow>(&format!(
            r#"
            INSERT INTO runs (id, event_id, input_payload, status)
            VALUES ($1, $2, $3, 'processing')
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(input.event_id)
        .bind(&input.input_payload)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Run::try_from(row)
    }

    #[instrument(skip(self, completion), fields(status = %completion.status))]
    async fn complete(&self, id: Uuid, completion: RunCompletion) -> StoreResult<bool> {
        let tool_calls =
            serde_json::to_value(&completion.tool_calls).map_err(StoreError::serialization)?;

        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = $2,
                agent_slug = $3,
                output_payload = $4,
                tool_calls = $5,
                error_message = $6,
                latency_ms = $7,
                tokens_used = $8,
                completed_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(completion.status.as_str())
        .bind(&completion.agent_slug)
        .bind(&completion.output_payload)
        .bind(&tool_calls)
        .bind(&completion.error_message)
        .bind(completion.latency_ms)
        .bind(completion.tokens_used)
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Run>> {
        let row = sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM runs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(Run::try_from).transpose()
    }

    async fn list_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM runs WHERE event_id = $1 ORDER BY created_at, id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter().map(Run::try_from).collect()
    }
}
