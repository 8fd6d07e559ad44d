// PostgreSQL EventStore
//
// Claiming is one statement: a CTE selects the oldest claimable row with
// FOR UPDATE SKIP LOCKED and the UPDATE locks it in the same step. A second
// runner never waits on, or re-reads, a row another runner is claiming.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use switchyard_core::{
    ClaimedEvent, Event, EventFilter, EventStatus, EventStore, Lease, NewEvent, StoreError,
    StoreResult,
};

use crate::models::{ClaimedEventRow, EventRow};

const EVENT_COLUMNS: &str = "id, intent, payload, business_id, plugin_instance_id, target_agent, \
     status, locked_at, locked_by, claimed_run_id, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(skip(self, input), fields(intent = %input.intent, business_id = %input.business_id))]
    async fn enqueue(&self, input: NewEvent) -> StoreResult<Event> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO events (id, intent, payload, business_id, plugin_instance_id, target_agent, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.intent)
        .bind(&input.payload)
        .bind(&input.business_id)
        .bind(input.plugin_instance_id)
        .bind(&input.target_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::database)?;

        debug!(event_id = %row.id, "Enqueued event");
        Event::try_from(row)
    }

    #[instrument(skip(self))]
    async fn claim_next(
        &self,
        runner_id: &str,
        lease_timeout: Duration,
    ) -> StoreResult<Option<ClaimedEvent>> {
        let row = sqlx::query_as::<_, ClaimedEventRow>(
            r#"
            WITH claimable AS (
                SELECT id, status AS previous_status
                FROM events
                WHERE status = 'pending'
                   OR (status = 'processing' AND locked_at < NOW() - make_interval(secs => $2))
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE events e
            SET status = 'processing',
                locked_at = NOW(),
                locked_by = $1,
                updated_at = NOW()
            FROM claimable c
            WHERE e.id = c.id
            RETURNING e.id, e.intent, e.payload, e.business_id, e.plugin_instance_id,
                      e.target_agent, e.status, e.locked_at, e.locked_by, e.claimed_run_id,
                      e.created_at, e.updated_at, c.previous_status
            "#,
        )
        .bind(runner_id)
        .bind(lease_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to claim event: {}", e);
            StoreError::database(e)
        })?;

        row.map(ClaimedEvent::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn claim_by_id(&self, id: Uuid, runner_id: &str) -> StoreResult<Option<ClaimedEvent>> {
        let row = sqlx::query_as::<_, ClaimedEventRow>(
            r#"
            WITH target AS (
                SELECT id, status AS previous_status
                FROM events
                WHERE id = $1
                FOR UPDATE
            )
            UPDATE events e
            SET status = 'processing',
                locked_at = NOW(),
                locked_by = $2,
                updated_at = NOW()
            FROM target t
            WHERE e.id = t.id
            RETURNING e.id, e.intent, e.payload, e.business_id, e.plugin_instance_id,
                      e.target_agent, e.status, e.locked_at, e.locked_by, e.claimed_run_id,
                      e.created_at, e.updated_at, t.previous_status
            "#,
        )
        .bind(id)
        .bind(runner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(ClaimedEvent::try_from).transpose()
    }

    #[instrument(skip(self, lease), fields(runner_id = %lease.runner_id))]
    async fn finalize(
        &self,
        id: Uuid,
        lease: &Lease,
        status: EventStatus,
        run_id: Uuid,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET status = $2,
                claimed_run_id = $3,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'processing'
              AND locked_by = $4
              AND locked_at = $5
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(run_id)
        .bind(&lease.runner_id)
        .bind(lease.locked_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(Event::try_from).transpose()
    }

    async fn list(&self, filter: &EventFilter, limit: i64, offset: i64) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR business_id = $2)
            ORDER BY created_at, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.business_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter().map(Event::try_from).collect()
    }
}
