// Database models (internal, converted into core domain types)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use switchyard_core::records::{Booking, Lead, Notification, PluginState};
use switchyard_core::{
    AgentDefinition, ClaimedEvent, Event, EventStatus, Lease, Run, RunStatus, StoreError,
};

// ============================================
// Events
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub intent: String,
    pub payload: sqlx::types::JsonValue,
    pub business_id: String,
    pub plugin_instance_id: Option<Uuid>,
    pub target_agent: Option<String>,
    pub status: String,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub claimed_run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            intent: row.intent,
            payload: row.payload,
            business_id: row.business_id,
            plugin_instance_id: row.plugin_instance_id,
            target_agent: row.target_agent,
            status: row.status.parse().map_err(StoreError::serialization)?,
            locked_at: row.locked_at,
            locked_by: row.locked_by,
            claimed_run_id: row.claimed_run_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row returned by a claim: the updated event plus its status before the claim
#[derive(Debug, Clone, FromRow)]
pub struct ClaimedEventRow {
    #[sqlx(flatten)]
    pub event: EventRow,
    pub previous_status: String,
}

impl TryFrom<ClaimedEventRow> for ClaimedEvent {
    type Error = StoreError;

    fn try_from(row: ClaimedEventRow) -> Result<Self, Self::Error> {
        let previous_status: EventStatus = row
            .previous_status
            .parse()
            .map_err(StoreError::serialization)?;
        let event = Event::try_from(row.event)?;
        let lease = match (&event.locked_by, event.locked_at) {
            (Some(runner_id), Some(locked_at)) => Lease {
                runner_id: runner_id.clone(),
                locked_at,
            },
            _ => {
                return Err(StoreError::serialization(format!(
                    "claimed event {} has no lease",
                    event.id
                )))
            }
        };
        Ok(ClaimedEvent {
            event,
            lease,
            previous_status,
        })
    }
}

// ============================================
// Runs
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct RunRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub agent_slug: Option<String>,
    pub input_payload: sqlx::types::JsonValue,
    pub output_payload: Option<sqlx::types::JsonValue>,
    pub tool_calls: sqlx::types::JsonValue,
    pub status: String,
    pub error_message: Option<String>,
    pub latency_ms: Option<i64>,
    pub tokens_used: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RunRow> for Run {
    type Error = StoreError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let status: RunStatus = row.status.parse().map_err(StoreError::serialization)?;
        Ok(Run {
            id: row.id,
            event_id: row.event_id,
            agent_slug: row.agent_slug,
            input_payload: row.input_payload,
            output_payload: row.output_payload,
            tool_calls: serde_json::from_value(row.tool_calls)
                .map_err(StoreError::serialization)?,
            status,
            error_message: row.error_message,
            latency_ms: row.latency_ms,
            tokens_used: row.tokens_used,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

// ============================================
// Agents
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct AgentRow {
    pub slug: String,
    pub name: String,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub is_active: bool,
    pub routing: sqlx::types::JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AgentRow> for AgentDefinition {
    type Error = StoreError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(AgentDefinition {
            slug: row.slug,
            name: row.name,
            system_prompt: row.system_prompt,
            allowed_tools: row.allowed_tools,
            is_active: row.is_active,
            routing: serde_json::from_value(row.routing).map_err(StoreError::serialization)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================
// Tool records
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct LeadRow {
    pub id: String,
    pub business_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub stage: String,
    pub notes: Option<String>,
    pub data: sqlx::types::JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Lead {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            source: row.source,
            stage: row.stage,
            notes: row.notes,
            data: row.data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub business_id: String,
    pub calendar_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub lead_id: Option<String>,
    pub attendee_name: Option<String>,
    pub attendee_email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            business_id: row.business_id,
            calendar_id: row.calendar_id,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            lead_id: row.lead_id,
            attendee_name: row.attendee_name,
            attendee_email: row.attendee_email,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub business_id: String,
    pub channel: String,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            business_id: row.business_id,
            channel: row.channel,
            recipient: row.recipient,
            subject: row.subject,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PluginStateRow {
    pub plugin_instance_id: Uuid,
    pub key: String,
    pub business_id: String,
    pub value: sqlx::types::JsonValue,
    pub updated_at: DateTime<Utc>,
}

impl From<PluginStateRow> for PluginState {
    fn from(row: PluginStateRow) -> Self {
        PluginState {
            plugin_instance_id: row.plugin_instance_id,
            key: row.key,
            business_id: row.business_id,
            value: row.value,
            updated_at: row.updated_at,
        }
    }
}
