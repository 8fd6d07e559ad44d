// In-memory backends
//
// Same semantics as the PostgreSQL stores, held behind parking_lot locks.
// Used by tests and by local runs without a database. Each store exposes a
// few extra helpers for inspecting or rigging state in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::agent::AgentDefinition;
use crate::error::{StoreError, StoreResult};
use crate::event::{ClaimedEvent, Event, EventFilter, EventStatus, Lease, NewEvent};
use crate::model::{ModelClient, ModelInput, ModelInvocationError, ModelResponse};
use crate::records::{
    Booking, Lead, NewBooking, NewLead, NewNotification, Notification, PluginState,
    DEFAULT_LEAD_STAGE,
};
use crate::run::{NewRun, Run, RunCompletion, RunStatus};
use crate::runner::RunnerStores;
use crate::tools::ToolStores;
use crate::traits::{
    AgentStore, BookingStore, EventStore, LeadStore, NotificationStore, PluginStateStore, RunStore,
};

// ============================================================================
// Events
// ============================================================================

#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<Uuid, Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.events.read().len()
    }

    /// All events, oldest first
    pub fn all(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self.events.read().values().cloned().collect();
        events.sort_by_key(|e| (e.created_at, e.id));
        events
    }

    /// Move an event's lease back in time, as if its runner stalled
    pub fn backdate_lease(&self, id: Uuid, by: chrono::Duration) {
        if let Some(event) = self.events.write().get_mut(&id) {
            event.locked_at = event.locked_at.map(|at| at - by);
        }
    }

    fn claim(event: &mut Event, runner_id: &str) -> ClaimedEvent {
        let now = Utc::now();
        let previous_status = event.status;
        event.status = EventStatus::Processing;
        event.locked_at = Some(now);
        event.locked_by = Some(runner_id.to_string());
        event.updated_at = now;
        ClaimedEvent {
            event: event.clone(),
            lease: Lease {
                runner_id: runner_id.to_string(),
                locked_at: now,
            },
            previous_status,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn enqueue(&self, input: NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::now_v7(),
            intent: input.intent,
            payload: input.payload,
            business_id: input.business_id,
            plugin_instance_id: input.plugin_instance_id,
            target_agent: input.target_agent,
            status: EventStatus::Pending,
            locked_at: None,
            locked_by: None,
            claimed_run_id: None,
            created_at: now,
            updated_at: now,
        };
        self.events.write().insert(event.id, event.clone());
        Ok(event)
    }

    async fn claim_next(
        &self,
        runner_id: &str,
        lease_timeout: Duration,
    ) -> StoreResult<Option<ClaimedEvent>> {
        let lease_timeout =
            chrono::Duration::from_std(lease_timeout).map_err(StoreError::database)?;
        let stale_before = Utc::now() - lease_timeout;

        // Select and lock under one write guard
        let mut events = self.events.write();
        let candidate = events
            .values()
            .filter(|e| match e.status {
                EventStatus::Pending => true,
                EventStatus::Processing => e.locked_at.map_or(true, |at| at < stale_before),
                _ => false,
            })
            .min_by_key(|e| (e.created_at, e.id))
            .map(|e| e.id);

        Ok(candidate
            .and_then(|id| events.get_mut(&id))
            .map(|event| Self::claim(event, runner_id)))
    }

    async fn claim_by_id(&self, id: Uuid, runner_id: &str) -> StoreResult<Option<ClaimedEvent>> {
        let mut events = self.events.write();
        Ok(events.get_mut(&id).map(|event| Self::claim(event, runner_id)))
    }

    async fn finalize(
        &self,
        id: Uuid,
        lease: &Lease,
        status: EventStatus,
        run_id: Uuid,
    ) -> StoreResult<bool> {
        let mut events = self.events.write();
        let Some(event) = events.get_mut(&id) else {
            return Ok(false);
        };
        let held = event.status == EventStatus::Processing
            && event.locked_by.as_deref() == Some(lease.runner_id.as_str())
            && event.locked_at == Some(lease.locked_at);
        if !held {
            return Ok(false);
        }
        event.status = status;
        event.claimed_run_id = Some(run_id);
        event.updated_at = Utc::now();
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.events.read().get(&id).cloned())
    }

    async fn list(&self, filter: &EventFilter, limit: i64, offset: i64) -> StoreResult<Vec<Event>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .filter(|e| {
                filter
                    .business_id
                    .as_deref()
                    .map_or(true, |b| e.business_id == b)
            })
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

// ============================================================================
// Runs
// ============================================================================

#[derive(Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<Uuid, Run>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.runs.read().len()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self, input: NewRun) -> StoreResult<Run> {
        let run = Run {
            id: Uuid::now_v7(),
            event_id: input.event_id,
            agent_slug: None,
            input_payload: input.input_payload,
            output_payload: None,
            tool_calls: Vec::new(),
            status: RunStatus::Processing,
            error_message: None,
            latency_ms: None,
            tokens_used: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.runs.write().insert(run.id, run.clone());
        Ok(run)
    }

    async fn complete(&self, id: Uuid, completion: RunCompletion) -> StoreResult<bool> {
        let mut runs = self.runs.write();
        let Some(run) = runs
            .get_mut(&id)
            .filter(|r| r.status == RunStatus::Processing)
        else {
            return Ok(false);
        };
        run.status = completion.status;
        run.agent_slug = completion.agent_slug;
        run.output_payload = completion.output_payload;
        run.tool_calls = completion.tool_calls;
        run.error_message = completion.error_message;
        run.latency_ms = Some(completion.latency_ms);
        run.tokens_used = completion.tokens_used;
        run.completed_at = Some(Utc::now());
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Run>> {
        Ok(self.runs.read().get(&id).cloned())
    }

    async fn list_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Run>> {
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| (r.created_at, r.id));
        Ok(runs)
    }
}

// ============================================================================
// Agents
// ============================================================================

#[derive(Default)]
pub struct InMemoryAgentStore {
    agents: RwLock<HashMap<String, AgentDefinition>>,
    unavailable: AtomicBool,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: AgentDefinition) {
        self.agents.write().insert(agent.slug.clone(), agent);
    }

    /// Make every lookup fail with a database error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get_active(&self, slug: &str) -> StoreResult<Option<AgentDefinition>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::database("agent store unavailable"));
        }
        Ok(self
            .agents
            .read()
            .get(slug)
            .filter(|a| a.is_active)
            .cloned())
    }
}

// ============================================================================
// Leads
// ============================================================================

/// Lead ids are sequential per store: "L1", "L2", ...
#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: RwLock<HashMap<String, Lead>>,
    next_id: AtomicU64,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Lead> {
        let mut leads: Vec<Lead> = self.leads.read().values().cloned().collect();
        leads.sort_by_key(|l| l.created_at);
        leads
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn create(&self, input: NewLead) -> StoreResult<Lead> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let lead = Lead {
            id: format!("L{n}"),
            business_id: input.business_id,
            name: input.name,
            email: input.email,
            phone: input.phone,
            source: input.source,
            stage: input.stage.unwrap_or_else(|| DEFAULT_LEAD_STAGE.to_string()),
            notes: input.notes,
            data: input.data,
            created_at: now,
            updated_at: now,
        };
        self.leads.write().insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    async fn set_stage(
        &self,
        business_id: &str,
        lead_id: &str,
        stage: &str,
    ) -> StoreResult<Option<Lead>> {
        let mut leads = self.leads.write();
        Ok(leads
            .get_mut(lead_id)
            .filter(|l| l.business_id == business_id)
            .map(|lead| {
                lead.stage = stage.to_string();
                lead.updated_at = Utc::now();
                lead.clone()
            }))
    }

    async fn get(&self, business_id: &str, lead_id: &str) -> StoreResult<Option<Lead>> {
        Ok(self
            .leads
            .read()
            .get(lead_id)
            .filter(|l| l.business_id == business_id)
            .cloned())
    }
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: RwLock<Vec<Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Booking> {
        self.bookings.read().clone()
    }

    fn conflicts(
        bookings: &[Booking],
        business_id: &str,
        calendar_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> bool {
        bookings.iter().any(|b| {
            b.business_id == business_id
                && b.calendar_id == calendar_id
                && b.overlaps(starts_at, ends_at)
        })
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn is_available(
        &self,
        business_id: &str,
        calendar_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let bookings = self.bookings.read();
        Ok(!Self::conflicts(
            &bookings,
            business_id,
            calendar_id,
            starts_at,
            ends_at,
        ))
    }

    async fn book(&self, input: NewBooking) -> StoreResult<Option<Booking>> {
        // Check and insert under one write guard
        let mut bookings = self.bookings.write();
        if Self::conflicts(
            &bookings,
            &input.business_id,
            &input.calendar_id,
            input.starts_at,
            input.ends_at,
        ) {
            return Ok(None);
        }
        let booking = Booking {
            id: Uuid::now_v7(),
            business_id: input.business_id,
            calendar_id: input.calendar_id,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            lead_id: input.lead_id,
            attendee_name: input.attendee_name,
            attendee_email: input.attendee_email,
            notes: input.notes,
            created_at: Utc::now(),
        };
        bookings.push(booking.clone());
        Ok(Some(booking))
    }
}

// ============================================================================
// Plugin instance state
// ============================================================================

#[derive(Default)]
pub struct InMemoryPluginStateStore {
    entries: RwLock<HashMap<(Uuid, String), PluginState>>,
}

impl InMemoryPluginStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginStateStore for InMemoryPluginStateStore {
    async fn get(&self, plugin_instance_id: Uuid, key: &str) -> StoreResult<Option<PluginState>> {
        Ok(self
            .entries
            .read()
            .get(&(plugin_instance_id, key.to_string()))
            .cloned())
    }

    async fn put(
        &self,
        plugin_instance_id: Uuid,
        business_id: &str,
        key: &str,
        value: Value,
    ) -> StoreResult<PluginState> {
        let mut entries = self.entries.write();
        let entry = entries
            .entry((plugin_instance_id, key.to_string()))
            .or_insert_with(|| PluginState {
                plugin_instance_id,
                key: key.to_string(),
                business_id: business_id.to_string(),
                value: Value::Null,
                updated_at: Utc::now(),
            });
        if entry.business_id != business_id {
            return Err(StoreError::not_found("plugin instance", plugin_instance_id));
        }
        entry.value = value;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn merge(
        &self,
        plugin_instance_id: Uuid,
        business_id: &str,
        key: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<PluginState> {
        let mut entries = self.entries.write();
        let entry = entries
            .entry((plugin_instance_id, key.to_string()))
            .or_insert_with(|| PluginState {
                plugin_instance_id,
                key: key.to_string(),
                business_id: business_id.to_string(),
                value: Value::Object(Map::new()),
                updated_at: Utc::now(),
            });
        if entry.business_id != business_id {
            return Err(StoreError::not_found("plugin instance", plugin_instance_id));
        }
        let mut merged = match std::mem::take(&mut entry.value) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(patch);
        entry.value = Value::Object(merged);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, input: NewNotification) -> StoreResult<Notification> {
        let notification = Notification {
            id: Uuid::now_v7(),
            business_id: input.business_id,
            channel: input.channel,
            recipient: input.recipient,
            subject: input.subject,
            message: input.message,
            created_at: Utc::now(),
        };
        self.notifications.write().push(notification.clone());
        Ok(notification)
    }

    async fn list_for_business(&self, business_id: &str) -> StoreResult<Vec<Notification>> {
        Ok(self
            .notifications
            .read()
            .iter()
            .filter(|n| n.business_id == business_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Backend bundle
// ============================================================================

/// Every in-memory store, shared behind Arcs
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    pub events: Arc<InMemoryEventStore>,
    pub runs: Arc<InMemoryRunStore>,
    pub agents: Arc<InMemoryAgentStore>,
    pub leads: Arc<InMemoryLeadStore>,
    pub bookings: Arc<InMemoryBookingStore>,
    pub plugin_state: Arc<InMemoryPluginStateStore>,
    pub notifications: Arc<InMemoryNotificationStore>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runner_stores(&self) -> RunnerStores {
        RunnerStores {
            events: self.events.clone(),
            runs: self.runs.clone(),
            agents: self.agents.clone(),
            plugin_state: self.plugin_state.clone(),
        }
    }

    pub fn tool_stores(&self) -> ToolStores {
        ToolStores {
            events: self.events.clone(),
            leads: self.leads.clone(),
            bookings: self.bookings.clone(),
            plugin_state: self.plugin_state.clone(),
            notifications: self.notifications.clone(),
        }
    }
}

// ============================================================================
// Scripted model client
// ============================================================================

/// A recorded call to [`MockModelClient`]
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub system_prompt: String,
    pub input: ModelInput,
}

/// Model client that replays scripted replies in order.
///
/// Once the script is exhausted it answers with an empty decision.
#[derive(Default)]
pub struct MockModelClient {
    script: Mutex<VecDeque<Result<ModelResponse, ModelInvocationError>>>,
    invocations: Mutex<Vec<RecordedInvocation>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply whose decision is `raw`.
    ///
    /// A `raw` value that is not a valid decision is queued as a parse error.
    pub fn respond_with(&self, raw: Value) -> &Self {
        self.script
            .lock()
            .push_back(ModelResponse::from_raw(raw, Some(0)));
        self
    }

    pub fn respond_with_tokens(&self, raw: Value, tokens_used: i64) -> &Self {
        self.script
            .lock()
            .push_back(ModelResponse::from_raw(raw, Some(tokens_used)));
        self
    }

    pub fn fail_with(&self, error: ModelInvocationError) -> &Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn invoke(
        &self,
        system_prompt: &str,
        input: &ModelInput,
    ) -> Result<ModelResponse, ModelInvocationError> {
        self.invocations.lock().push(RecordedInvocation {
            system_prompt: system_prompt.to_string(),
            input: input.clone(),
        });
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| ModelResponse::from_raw(Value::Object(Map::new()), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LEASE: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_claim_takes_oldest_pending_event() {
        let store = InMemoryEventStore::new();
        let first = store
            .enqueue(NewEvent::new("contact.submit", "T1", json!({})))
            .await
            .unwrap();
        store
            .enqueue(NewEvent::new("contact.submit", "T1", json!({})))
            .await
            .unwrap();

        let claimed = store.claim_next("r1", LEASE).await.unwrap().unwrap();
        assert_eq!(claimed.event.id, first.id);
        assert_eq!(claimed.event.status, EventStatus::Processing);
        assert_eq!(claimed.event.locked_by.as_deref(), Some("r1"));
        assert_eq!(claimed.previous_status, EventStatus::Pending);
    }

    #[tokio::test]
    async fn test_empty_queue_is_idle() {
        let store = InMemoryEventStore::new();
        assert!(store.claim_next("r1", LEASE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_both_win() {
        let store = Arc::new(InMemoryEventStore::new());
        store
            .enqueue(NewEvent::new("contact.submit", "T1", json!({})))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .claim_next(&format!("r{i}"), LEASE)
                        .await
                        .unwrap()
                        .is_some()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_stale_lease_is_reclaimable_fresh_is_not() {
        let store = InMemoryEventStore::new();
        let event = store
            .enqueue(NewEvent::new("contact.submit", "T1", json!({})))
            .await
            .unwrap();
        store.claim_next("r1", LEASE).await.unwrap().unwrap();

        assert!(store.claim_next("r2", LEASE).await.unwrap().is_none());

        store.backdate_lease(event.id, chrono::Duration::seconds(301));
        let reclaimed = store.claim_next("r2", LEASE).await.unwrap().unwrap();
        assert_eq!(reclaimed.event.id, event.id);
        assert_eq!(reclaimed.previous_status, EventStatus::Processing);
        assert_eq!(reclaimed.event.locked_by.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_finalize_requires_current_lease() {
        let store = InMemoryEventStore::new();
        let event = store
            .enqueue(NewEvent::new("contact.submit", "T1", json!({})))
            .await
            .unwrap();
        let first = store.claim_next("r1", LEASE).await.unwrap().unwrap();
        store.backdate_lease(event.id, chrono::Duration::seconds(301));
        let second = store.claim_next("r2", LEASE).await.unwrap().unwrap();

        let stale = store
            .finalize(event.id, &first.lease, EventStatus::Failed, Uuid::now_v7())
            .await
            .unwrap();
        assert!(!stale);

        let run_id = Uuid::now_v7();
        let current = store
            .finalize(event.id, &second.lease, EventStatus::Completed, run_id)
            .await
            .unwrap();
        assert!(current);

        let stored = store.get(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Completed);
        assert_eq!(stored.claimed_run_id, Some(run_id));
        assert!(store.claim_next("r3", LEASE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_by_id_ignores_status() {
        let store = InMemoryEventStore::new();
        let event = store
            .enqueue(NewEvent::new("contact.submit", "T1", json!({})))
            .await
            .unwrap();
        let claimed = store.claim_next("r1", LEASE).await.unwrap().unwrap();
        store
            .finalize(event.id, &claimed.lease, EventStatus::Completed, Uuid::now_v7())
            .await
            .unwrap();

        let again = store.claim_by_id(event.id, "r2").await.unwrap().unwrap();
        assert_eq!(again.previous_status, EventStatus::Completed);
        assert!(store.claim_by_id(Uuid::now_v7(), "r2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_completes_once() {
        let store = InMemoryRunStore::new();
        let run = store
            .create(NewRun {
                event_id: Uuid::now_v7(),
                input_payload: json!({"email": "a@b.com"}),
            })
            .await
            .unwrap();

        assert!(store
            .complete(run.id, RunCompletion::failed(None, "boom", 5))
            .await
            .unwrap());
        assert!(!store
            .complete(
                run.id,
                RunCompletion::completed("lead_qualifier", json!({}), vec![], 5, None)
            )
            .await
            .unwrap());

        let stored = store.get(run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_inactive_agents_are_hidden() {
        let store = InMemoryAgentStore::new();
        store.insert(AgentDefinition::new("scheduler", "p", ["calendar.slot.book"]).inactive());
        assert!(store.get_active("scheduler").await.unwrap().is_none());

        store.set_unavailable(true);
        assert!(store.get_active("scheduler").await.is_err());
    }

    #[tokio::test]
    async fn test_plugin_state_merge_is_shallow() {
        let store = InMemoryPluginStateStore::new();
        let instance = Uuid::now_v7();
        let mut first = Map::new();
        first.insert("step".into(), json!(1));
        first.insert("profile".into(), json!({"name": "Ada"}));
        store.merge(instance, "T1", "state", first).await.unwrap();

        let mut second = Map::new();
        second.insert("step".into(), json!(2));
        second.insert("profile".into(), json!({"email": "a@b.com"}));
        let merged = store.merge(instance, "T1", "state", second).await.unwrap();

        assert_eq!(
            merged.value,
            json!({"step": 2, "profile": {"email": "a@b.com"}})
        );
    }

    #[tokio::test]
    async fn test_plugin_state_is_scoped_to_its_tenant() {
        let store = InMemoryPluginStateStore::new();
        let instance = Uuid::now_v7();
        store.put(instance, "T1", "state", json!({"step": 1})).await.unwrap();

        let mut patch = Map::new();
        patch.insert("step".into(), json!(9));
        assert!(matches!(
            store.merge(instance, "T2", "state", patch).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.put(instance, "T2", "state", json!({})).await,
            Err(StoreError::NotFound { .. })
        ));

        let stored = store.get(instance, "state").await.unwrap().unwrap();
        assert_eq!(stored.business_id, "T1");
        assert_eq!(stored.value, json!({"step": 1}));
    }

    #[tokio::test]
    async fn test_mock_model_replays_script() {
        let model = MockModelClient::new();
        model
            .respond_with(json!({"score": 10}))
            .fail_with(ModelInvocationError::Timeout("60s".into()));
        let input = ModelInput {
            intent: "contact.submit".into(),
            payload: json!({}),
            business_id: "T1".into(),
            tools: vec![],
        };

        let first = model.invoke("p", &input).await.unwrap();
        assert_eq!(first.decision.score, Some(10.0));
        assert!(model.invoke("p", &input).await.is_err());
        assert!(model.invoke("p", &input).await.unwrap().raw.is_object());
        assert_eq!(model.invocations().len(), 3);
    }
}
