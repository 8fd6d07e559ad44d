// Event domain types
//
// An Event is one unit of inbound work. External producers enqueue events in
// `pending`; the runner claims them (`processing`) and finalizes them
// (`completed` / `failed`). Events are never deleted by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Event status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processing => "processing",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
        }
    }

    /// Terminal statuses never match the claim predicate again
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Failed)
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "processing" => Ok(EventStatus::Processing),
            "completed" => Ok(EventStatus::Completed),
            "failed" => Ok(EventStatus::Failed),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

/// A queued work item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Event {
    pub id: Uuid,
    /// What triggered the event (e.g. `contact.submit`)
    pub intent: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: Value,
    /// Tenant identifier; scopes every side effect of the run
    pub business_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_instance_id: Option<Uuid>,
    /// Agent slug addressed directly (set by `agent.invoke`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<String>,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for enqueueing an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NewEvent {
    pub intent: String,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: Value,
    pub business_id: String,
    #[serde(default)]
    pub plugin_instance_id: Option<Uuid>,
    #[serde(default)]
    pub target_agent: Option<String>,
}

impl NewEvent {
    pub fn new(intent: impl Into<String>, business_id: impl Into<String>, payload: Value) -> Self {
        Self {
            intent: intent.into(),
            payload,
            business_id: business_id.into(),
            plugin_instance_id: None,
            target_agent: None,
        }
    }

    pub fn with_plugin_instance(mut self, plugin_instance_id: Uuid) -> Self {
        self.plugin_instance_id = Some(plugin_instance_id);
        self
    }

    pub fn with_target_agent(mut self, slug: impl Into<String>) -> Self {
        self.target_agent = Some(slug.into());
        self
    }
}

/// Proof of a claim: who holds the event and since when.
///
/// Finalization is conditioned on the lease still matching, so a runner
/// whose lease expired and was reclaimed cannot overwrite the newer claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub runner_id: String,
    pub locked_at: DateTime<Utc>,
}

/// An event handed to exactly one runner
#[derive(Debug, Clone)]
pub struct ClaimedEvent {
    pub event: Event,
    pub lease: Lease,
    /// Status the event had before this claim (pending, or a stale processing lease)
    pub previous_status: EventStatus,
}

/// Filter for listing events
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub business_id: Option<String>,
}
