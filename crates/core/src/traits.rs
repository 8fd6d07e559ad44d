// Store traits for pluggable backends
//
// The runner and the built-in tools only see these traits:
// - In-memory implementations (crate::memory) for tests and local runs
// - PostgreSQL implementations (switchyard-storage) for production

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::agent::AgentDefinition;
use crate::error::StoreResult;
use crate::event::{ClaimedEvent, Event, EventFilter, EventStatus, Lease, NewEvent};
use crate::records::{
    Booking, Lead, NewBooking, NewLead, NewNotification, Notification, PluginState,
};
use crate::run::{NewRun, Run, RunCompletion};

// ============================================================================
// EventStore - durable work queue with claim/lease protocol
// ============================================================================

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event in `pending`
    async fn enqueue(&self, input: NewEvent) -> StoreResult<Event>;

    /// Claim the oldest claimable event.
    ///
    /// Claimable means `pending`, or `processing` with `locked_at` older than
    /// `lease_timeout`. Selecting and locking must be one atomic step so that
    /// two runners can never both win the same row. Returns `None` when
    /// nothing is claimable.
    async fn claim_next(
        &self,
        runner_id: &str,
        lease_timeout: Duration,
    ) -> StoreResult<Option<ClaimedEvent>>;

    /// Claim a specific event regardless of its status or lease.
    ///
    /// Returns `None` only when the event does not exist.
    async fn claim_by_id(&self, id: Uuid, runner_id: &str) -> StoreResult<Option<ClaimedEvent>>;

    /// Move a claimed event to a terminal status and stamp the run id.
    ///
    /// Applies only while `lease` still matches the row. Returns `false`
    /// when the lease was lost to another runner.
    async fn finalize(
        &self,
        id: Uuid,
        lease: &Lease,
        status: EventStatus,
        run_id: Uuid,
    ) -> StoreResult<bool>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>>;

    /// List events, oldest first
    async fn list(&self, filter: &EventFilter, limit: i64, offset: i64) -> StoreResult<Vec<Event>>;
}

// ============================================================================
// RunStore - append-only audit records
// ============================================================================

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a run in `processing`
    async fn create(&self, input: NewRun) -> StoreResult<Run>;

    /// Apply the single completion update.
    ///
    /// Returns `false` if the run was already finalized; a finalized run is
    /// never modified.
    async fn complete(&self, id: Uuid, completion: RunCompletion) -> StoreResult<bool>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Run>>;

    /// All runs for an event, oldest first
    async fn list_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Run>>;
}

// ============================================================================
// AgentStore - read-only agent configuration
// ============================================================================

#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Fetch an agent by slug, only if it is active
    async fn get_active(&self, slug: &str) -> StoreResult<Option<AgentDefinition>>;
}

// ============================================================================
// Tool-owned stores
// ============================================================================

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn create(&self, input: NewLead) -> StoreResult<Lead>;

    /// Update the stage of a lead within a tenant. `None` if no such lead.
    async fn set_stage(
        &self,
        business_id: &str,
        lead_id: &str,
        stage: &str,
    ) -> StoreResult<Option<Lead>>;

    async fn get(&self, business_id: &str, lead_id: &str) -> StoreResult<Option<Lead>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Whether no booking on the calendar overlaps `[starts_at, ends_at)`
    async fn is_available(
        &self,
        business_id: &str,
        calendar_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Insert the booking only if the slot is still free, atomically.
    ///
    /// Returns `None` on conflict.
    async fn book(&self, input: NewBooking) -> StoreResult<Option<Booking>>;
}

#[async_trait]
pub trait PluginStateStore: Send + Sync {
    async fn get(&self, plugin_instance_id: Uuid, key: &str) -> StoreResult<Option<PluginState>>;

    /// Replace the value under `key`
    async fn put(
        &self,
        plugin_instance_id: Uuid,
        business_id: &str,
        key: &str,
        value: Value,
    ) -> StoreResult<PluginState>;

    /// Shallow-merge `patch` into the object stored under `key`
    async fn merge(
        &self,
        plugin_instance_id: Uuid,
        business_id: &str,
        key: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<PluginState>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, input: NewNotification) -> StoreResult<Notification>;

    async fn list_for_business(&self, business_id: &str) -> StoreResult<Vec<Notification>>;
}
