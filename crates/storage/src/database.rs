// Connection pool and store factories

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use switchyard_core::{RunnerStores, ToolStores};

use crate::{
    PostgresAgentStore, PostgresBookingStore, PostgresEventStore, PostgresLeadStore,
    PostgresNotificationStore, PostgresPluginStateStore, PostgresRunStore,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        Self::connect(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        Ok(Self { pool })
    }

    /// Connect using `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`
    pub async fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Self::connect(&database_url, max_connections).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `crates/storage/migrations`
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn event_store(&self) -> PostgresEventStore {
        PostgresEventStore::new(self.pool.clone())
    }

    pub fn run_store(&self) -> PostgresRunStore {
        PostgresRunStore::new(self.pool.clone())
    }

    pub fn agent_store(&self) -> PostgresAgentStore {
        PostgresAgentStore::new(self.pool.clone())
    }

    pub fn plugin_state_store(&self) -> PostgresPluginStateStore {
        PostgresPluginStateStore::new(self.pool.clone())
    }

    /// Stores the runner reads and writes directly
    pub fn runner_stores(&self) -> RunnerStores {
        RunnerStores {
            events: Arc::new(self.event_store()),
            runs: Arc::new(self.run_store()),
            agents: Arc::new(self.agent_store()),
            plugin_state: Arc::new(self.plugin_state_store()),
        }
    }

    /// Stores the built-in tools act on
    pub fn tool_stores(&self) -> ToolStores {
        ToolStores {
            events: Arc::new(self.event_store()),
            leads: Arc::new(PostgresLeadStore::new(self.pool.clone())),
            bookings: Arc::new(PostgresBookingStore::new(self.pool.clone())),
            plugin_state: Arc::new(self.plugin_state_store()),
            notifications: Arc::new(PostgresNotificationStore::new(self.pool.clone())),
        }
    }
}
