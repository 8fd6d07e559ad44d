// PostgreSQL AgentStore (read-only; agents are managed outside the runner)

use async_trait::async_trait;
use sqlx::PgPool;

use switchyard_core::{AgentDefinition, AgentStore, StoreError, StoreResult};

use crate::models::AgentRow;

#[derive(Clone)]
pub struct PostgresAgentStore {
    pool: PgPool,
}

impl PostgresAgentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentStore for PostgresAgentStore {
    async fn get_active(&self, slug: &str) -> StoreResult<Option<AgentDefinition>> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT slug, name, system_prompt, allowed_tools, is_active, routing, created_at, updated_at
            FROM agents
            WHERE slug = $1 AND is_active = TRUE
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(AgentDefinition::try_from).transpose()
    }
}
