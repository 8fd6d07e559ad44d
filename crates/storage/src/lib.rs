// Postgres storage layer with sqlx
//
// This crate provides database implementations for the core store traits:
// - PostgresEventStore: EventStore (atomic SKIP LOCKED claim, lease-checked finalize)
// - PostgresRunStore: RunStore
// - PostgresAgentStore: AgentStore (read-only)
// - Lead, booking, plugin state and notification stores for the built-in tools

pub mod agent_store;
pub mod database;
pub mod event_store;
pub mod models;
pub mod run_store;
pub mod tool_stores;

pub use agent_store::PostgresAgentStore;
pub use database::Database;
pub use event_store::PostgresEventStore;
pub use run_store::PostgresRunStore;
pub use tool_stores::{
    PostgresBookingStore, PostgresLeadStore, PostgresNotificationStore, PostgresPluginStateStore,
};
