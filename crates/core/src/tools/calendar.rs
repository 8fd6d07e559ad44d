// Calendar tools: availability check and slot booking
//
// Booking re-verifies the slot at execution time. The store performs the
// check and the insert atomically, so two runs racing for the same slot
// cannot both book it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{str_field, Tool, ToolContext, ToolExecutionResult, ToolId};
use crate::records::NewBooking;
use crate::traits::BookingStore;

const DEFAULT_CALENDAR: &str = "default";
const DEFAULT_DURATION_MINUTES: i64 = 30;
const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Recorded when the slot was taken between proposal and execution
pub const SLOT_ALREADY_BOOKED: &str = "slot already booked";

/// Requested slot, parsed from a tool payload
#[derive(Debug, Clone, PartialEq)]
struct Slot {
    calendar_id: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl Slot {
    fn from_payload(payload: &Value) -> Result<Self, String> {
        let start = str_field(payload, "start").ok_or("start is required")?;
        let starts_at = DateTime::parse_from_rfc3339(&start)
            .map_err(|e| format!("start must be an RFC 3339 timestamp: {e}"))?
            .with_timezone(&Utc);

        let minutes = match payload.get("durationMinutes") {
            None | Some(Value::Null) => DEFAULT_DURATION_MINUTES,
            Some(v) => v
                .as_i64()
                .ok_or("durationMinutes must be an integer")?,
        };
        if minutes <= 0 || minutes > MAX_DURATION_MINUTES {
            return Err(format!(
                "durationMinutes must be between 1 and {MAX_DURATION_MINUTES}"
            ));
        }

        Ok(Self {
            calendar_id: str_field(payload, "calendarId")
                .unwrap_or_else(|| DEFAULT_CALENDAR.to_string()),
            starts_at,
            ends_at: starts_at + Duration::minutes(minutes),
        })
    }
}

fn slot_schema(extra: Value) -> Value {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "start": {"type": "string", "format": "date-time"},
            "durationMinutes": {"type": "integer", "default": DEFAULT_DURATION_MINUTES},
            "calendarId": {"type": "string", "default": DEFAULT_CALENDAR}
        },
        "required": ["start"]
    });
    if let (Some(props), Value::Object(extra)) = (schema["properties"].as_object_mut(), extra) {
        props.extend(extra);
    }
    schema
}

pub struct CheckAvailabilityTool {
    bookings: Arc<dyn BookingStore>,
}

impl CheckAvailabilityTool {
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn id(&self) -> ToolId {
        ToolId::CalendarAvailabilityCheck
    }

    fn description(&self) -> &str {
        "Check whether a calendar slot is free."
    }

    fn parameters_schema(&self) -> Value {
        slot_schema(json!({}))
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let slot = match Slot::from_payload(&payload) {
            Ok(slot) => slot,
            Err(message) => return ToolExecutionResult::tool_error(message),
        };

        match self
            .bookings
            .is_available(
                &context.business_id,
                &slot.calendar_id,
                slot.starts_at,
                slot.ends_at,
            )
            .await
        {
            Ok(available) => ToolExecutionResult::success(json!({
                "available": available,
                "calendarId": slot.calendar_id,
                "start": slot.starts_at,
                "end": slot.ends_at
            })),
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

pub struct BookSlotTool {
    bookings: Arc<dyn BookingStore>,
}

impl BookSlotTool {
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }
}

#[async_trait]
impl Tool for BookSlotTool {
    fn id(&self) -> ToolId {
        ToolId::CalendarSlotBook
    }

    fn description(&self) -> &str {
        "Book a calendar slot. Fails if the slot is no longer free."
    }

    fn parameters_schema(&self) -> Value {
        slot_schema(json!({
            "leadId": {"type": "string"},
            "name": {"type": "string", "description": "Attendee name"},
            "email": {"type": "string", "description": "Attendee email"},
            "notes": {"type": "string"}
        }))
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let slot = match Slot::from_payload(&payload) {
            Ok(slot) => slot,
            Err(message) => return ToolExecutionResult::tool_error(message),
        };

        let input = NewBooking {
            business_id: context.business_id.clone(),
            calendar_id: slot.calendar_id,
            starts_at: slot.starts_at,
            ends_at: slot.ends_at,
            lead_id: str_field(&payload, "leadId"),
            attendee_name: str_field(&payload, "name"),
            attendee_email: str_field(&payload, "email"),
            notes: str_field(&payload, "notes"),
        };

        match self.bookings.book(input).await {
            Ok(Some(booking)) => ToolExecutionResult::success(json!({
                "bookingId": booking.id,
                "calendarId": booking.calendar_id,
                "start": booking.starts_at,
                "end": booking.ends_at,
                "success": true
            })),
            Ok(None) => ToolExecutionResult::tool_error(SLOT_ALREADY_BOOKED),
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBookingStore;

    fn ctx() -> ToolContext {
        ToolContext::new("T1", None)
    }

    #[test]
    fn test_slot_defaults() {
        let slot = Slot::from_payload(&json!({"start": "2026-03-02T10:00:00Z"})).unwrap();
        assert_eq!(slot.calendar_id, "default");
        assert_eq!(slot.ends_at - slot.starts_at, Duration::minutes(30));
    }

    #[test]
    fn test_slot_rejects_bad_input() {
        assert!(Slot::from_payload(&json!({})).is_err());
        assert!(Slot::from_payload(&json!({"start": "tomorrow"})).is_err());
        assert!(Slot::from_payload(&json!({
            "start": "2026-03-02T10:00:00Z",
            "durationMinutes": 0
        }))
        .is_err());
    }

    #[tokio::test]
    async fn test_second_booking_of_same_slot_conflicts() {
        let bookings = Arc::new(InMemoryBookingStore::new());
        let book = BookSlotTool::new(bookings.clone());
        let check = CheckAvailabilityTool::new(bookings.clone());
        let payload = json!({"start": "2026-03-02T10:00:00Z", "durationMinutes": 60});

        let before = check.execute(payload.clone(), &ctx()).await;
        assert!(matches!(before, ToolExecutionResult::Success(ref v) if v["available"] == true));

        assert!(book.execute(payload.clone(), &ctx()).await.is_success());
        assert_eq!(
            book.execute(json!({"start": "2026-03-02T10:30:00Z"}), &ctx()).await,
            ToolExecutionResult::tool_error(SLOT_ALREADY_BOOKED)
        );

        let after = check.execute(payload, &ctx()).await;
        assert!(matches!(after, ToolExecutionResult::Success(ref v) if v["available"] == false));
        assert_eq!(bookings.all().len(), 1);
    }

    #[tokio::test]
    async fn test_calendars_and_tenants_are_independent() {
        let bookings = Arc::new(InMemoryBookingStore::new());
        let book = BookSlotTool::new(bookings.clone());
        let payload = json!({"start": "2026-03-02T10:00:00Z"});

        assert!(book.execute(payload.clone(), &ctx()).await.is_success());
        assert!(book
            .execute(payload.clone(), &ToolContext::new("T2", None))
            .await
            .is_success());
        assert!(book
            .execute(
                json!({"start": "2026-03-02T10:00:00Z", "calendarId": "room-b"}),
                &ctx()
            )
            .await
            .is_success());
    }
}
