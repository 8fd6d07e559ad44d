// Tenant-scoped records written by the built-in tools
//
// Every record carries the business_id of the event whose run produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Plugin state key patched by `plugin.state.patch`
pub const STATE_KEY: &str = "state";

/// Plugin state key holding the runner's most recent decision snapshot
pub const LATEST_ANALYSIS_KEY: &str = "latest_analysis";

/// Default pipeline stage for new leads
pub const DEFAULT_LEAD_STAGE: &str = "new";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: String,
    pub business_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub stage: String,
    pub notes: Option<String>,
    /// Remaining payload fields not mapped to columns
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub business_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub stage: Option<String>,
    pub notes: Option<String>,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
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

impl Booking {
    /// Half-open interval overlap: back-to-back slots do not conflict
    pub fn overlaps(&self, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> bool {
        self.starts_at < ends_at && starts_at < self.ends_at
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub business_id: String,
    pub calendar_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub lead_id: Option<String>,
    pub attendee_name: Option<String>,
    pub attendee_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub business_id: String,
    pub channel: String,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub business_id: String,
    pub channel: String,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}

/// One keyed JSON value attached to a plugin instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PluginState {
    pub plugin_instance_id: Uuid,
    pub key: String,
    pub business_id: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn booking(start_hour: u32, end_hour: u32) -> Booking {
        Booking {
            id: Uuid::now_v7(),
            business_id: "T1".into(),
            calendar_id: "default".into(),
            starts_at: Utc.with_ymd_and_hms(2026, 3, 2, start_hour, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2026, 3, 2, end_hour, 0, 0).unwrap(),
            lead_id: None,
            attendee_name: None,
            attendee_email: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_overlap_is_half_open() {
        let b = booking(10, 11);
        let eleven = b.ends_at;
        assert!(!b.overlaps(eleven, eleven + Duration::minutes(30)));
        assert!(b.overlaps(b.starts_at + Duration::minutes(30), eleven + Duration::minutes(30)));
        assert!(b.overlaps(b.starts_at - Duration::hours(1), eleven + Duration::hours(1)));
    }
}
