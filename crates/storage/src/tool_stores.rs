// PostgreSQL stores for records written by the built-in tools

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use switchyard_core::records::{
    Booking, Lead, NewBooking, NewLead, NewNotification, Notification, PluginState,
    DEFAULT_LEAD_STAGE,
};
use switchyard_core::{
    BookingStore, LeadStore, NotificationStore, PluginStateStore, StoreError, StoreResult,
};

use crate::models::{BookingRow, LeadRow, NotificationRow, PluginStateRow};

// ============================================
// Leads
// ============================================

const LEAD_COLUMNS: &str =
    "id, business_id, name, email, phone, source, stage, notes, data, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresLeadStore {
    pool: PgPool,
}

impl PostgresLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PostgresLeadStore {
    #[instrument(skip(self, input), fields(business_id = %input.business_id))]
    async fn create(&self, input: NewLead) -> StoreResult<Lead> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            INSERT INTO leads (id, business_id, name, email, phone, source, stage, notes, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7().to_string())
        .bind(&input.business_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.source)
        .bind(input.stage.as_deref().unwrap_or(DEFAULT_LEAD_STAGE))
        .bind(&input.notes)
        .bind(&input.data)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(row.into())
    }

    async fn set_stage(
        &self,
        business_id: &str,
        lead_id: &str,
        stage: &str,
    ) -> StoreResult<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            UPDATE leads
            SET stage = $3, updated_at = NOW()
            WHERE business_id = $1 AND id = $2
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(business_id)
        .bind(lead_id)
        .bind(stage)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(row.map(Into::into))
    }

    async fn get(&self, business_id: &str, lead_id: &str) -> StoreResult<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE business_id = $1 AND id = $2"
        ))
        .bind(business_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(row.map(Into::into))
    }
}

// ============================================
// Bookings
// ============================================

#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn is_available(
        &self,
        business_id: &str,
        calendar_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE business_id = $1 AND calendar_id = $2
                  AND starts_at < $4 AND $3 < ends_at
            )
            "#,
        )
        .bind(business_id)
        .bind(calendar_id)
        .bind(starts_at)
        .bind(ends_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(!taken)
    }

    /// Serializes bookers of one calendar with a transaction-scoped advisory
    /// lock, then inserts only if no overlapping booking exists.
    #[instrument(skip(self, input), fields(business_id = %input.business_id, calendar_id = %input.calendar_id))]
    async fn book(&self, input: NewBooking) -> StoreResult<Option<Booking>> {
        let mut tx = self.pool.begin().await.map_err(StoreError::database)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || '/' || $2))")
            .bind(&input.business_id)
            .bind(&input.calendar_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::database)?;

        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (id, business_id, calendar_id, starts_at, ends_at,
                                  lead_id, attendee_name, attendee_email, notes)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE NOT EXISTS (
                SELECT 1 FROM bookings
                WHERE business_id = $2 AND calendar_id = $3
                  AND starts_at < $5 AND $4 < ends_at
            )
            RETURNING id, business_id, calendar_id, starts_at, ends_at,
                      lead_id, attendee_name, attendee_email, notes, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.business_id)
        .bind(&input.calendar_id)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(&input.lead_id)
        .bind(&input.attendee_name)
        .bind(&input.attendee_email)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::database)?;

        tx.commit().await.map_err(StoreError::database)?;

        if row.is_none() {
            debug!("Slot already booked");
        }
        Ok(row.map(Into::into))
    }
}

// ============================================
// Plugin instance state
// ============================================

const STATE_COLUMNS: &str = "plugin_instance_id, key, business_id, value, updated_at";

#[derive(Clone)]
pub struct PostgresPluginStateStore {
    pool: PgPool,
}

impl PostgresPluginStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PluginStateStore for PostgresPluginStateStore {
    async fn get(&self, plugin_instance_id: Uuid, key: &str) -> StoreResult<Option<PluginState>> {
        let row = sqlx::query_as::<_, PluginStateRow>(&format!(
            "SELECT {STATE_COLUMNS} FROM plugin_instance_state WHERE plugin_instance_id = $1 AND key = $2"
        ))
        .bind(plugin_instance_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(row.map(Into::into))
    }

    async fn put(
        &self,
        plugin_instance_id: Uuid,
        business_id: &str,
        key: &str,
        value: Value,
    ) -> StoreResult<PluginState> {
        let row = sqlx::query_as::<_, PluginStateRow>(&format!(
            r#"
            INSERT INTO plugin_instance_state (plugin_instance_id, key, business_id, value, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (plugin_instance_id, key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_at = NOW()
            WHERE plugin_instance_state.business_id = EXCLUDED.business_id
            RETURNING {STATE_COLUMNS}
            "#
        ))
        .bind(plugin_instance_id)
        .bind(key)
        .bind(business_id)
        .bind(&value)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?
        .ok_or_else(|| StoreError::not_found("plugin instance", plugin_instance_id))?;

        Ok(row.into())
    }

    /// Shallow merge with jsonb `||` in a single upsert. A row owned by
    /// another tenant is left untouched and reported as not found.
    async fn merge(
        &self,
        plugin_instance_id: Uuid,
        business_id: &str,
        key: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<PluginState> {
        let row = sqlx::query_as::<_, PluginStateRow>(&format!(
            r#"
            INSERT INTO plugin_instance_state (plugin_instance_id, key, business_id, value, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (plugin_instance_id, key) DO UPDATE
            SET value = CASE
                    WHEN jsonb_typeof(plugin_instance_state.value) = 'object'
                        THEN plugin_instance_state.value || EXCLUDED.value
                    ELSE EXCLUDED.value
                END,
                updated_at = NOW()
            WHERE plugin_instance_state.business_id = EXCLUDED.business_id
            RETURNING {STATE_COLUMNS}
            "#
        ))
        .bind(plugin_instance_id)
        .bind(key)
        .bind(business_id)
        .bind(Value::Object(patch))
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?
        .ok_or_else(|| StoreError::not_found("plugin instance", plugin_instance_id))?;

        Ok(row.into())
    }
}

// ============================================
// Notifications
// ============================================

const NOTIFICATION_COLUMNS: &str =
    "id, business_id, channel, recipient, subject, message, created_at";

#[derive(Clone)]
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn create(&self, input: NewNotification) -> StoreResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            INSERT INTO notifications (id, business_id, channel, recipient, subject, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.business_id)
        .bind(&input.channel)
        .bind(&input.recipient)
        .bind(&input.subject)
        .bind(&input.message)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(row.into())
    }

    async fn list_for_business(&self, business_id: &str) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE business_id = $1 ORDER BY created_at, id"
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
