// Event HTTP routes (enqueue and read)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use switchyard_core::{Event, EventFilter, EventStatus, EventStore, NewEvent, Run, RunStore};

use crate::common::{bad_request, not_found, store_error, ApiError, ErrorResponse, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub runs: Arc<dyn RunStore>,
}

/// Request to enqueue an event
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    #[schema(example = "contact.submit")]
    pub intent: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Value,
    #[serde(alias = "businessId")]
    pub business_id: String,
    #[serde(default, alias = "pluginInstanceId")]
    pub plugin_instance_id: Option<Uuid>,
    /// Address an agent directly instead of routing by intent
    #[serde(default, alias = "targetAgent")]
    pub target_agent: Option<String>,
}

impl CreateEventRequest {
    fn into_new_event(self) -> Result<NewEvent, ApiError> {
        if self.intent.trim().is_empty() {
            return Err(bad_request("intent is required"));
        }
        if self.business_id.trim().is_empty() {
            return Err(bad_request("business_id is required"));
        }
        let payload = match self.payload {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Ok(NewEvent {
            intent: self.intent,
            payload,
            business_id: self.business_id,
            plugin_instance_id: self.plugin_instance_id,
            target_agent: self.target_agent,
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEventsParams {
    pub status: Option<String>,
    pub business_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", get(list_events).post(create_event))
        .route("/v1/events/:event_id", get(get_event))
        .route("/v1/events/:event_id/runs", get(list_event_runs))
        .with_state(state)
}

/// POST /v1/events - Enqueue an event
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event enqueued", body = Event),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let input = req.into_new_event()?;
    let event = state
        .events
        .enqueue(input)
        .await
        .map_err(|e| store_error("Failed to enqueue event", e))?;

    tracing::info!(event_id = %event.id, intent = %event.intent, business_id = %event.business_id, "Event enqueued");
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /v1/events - List events, oldest first
#[utoipa::path(
    get,
    path = "/v1/events",
    params(ListEventsParams),
    responses(
        (status = 200, description = "List of events", body = ListResponse<Event>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
) -> Result<Json<ListResponse<Event>>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<EventStatus>)
        .transpose()
        .map_err(bad_request)?;
    let filter = EventFilter {
        status,
        business_id: params.business_id,
    };

    let events = state
        .events
        .list(&filter, params.limit.clamp(1, 500), params.offset.max(0))
        .await
        .map_err(|e| store_error("Failed to list events", e))?;

    Ok(Json(events.into()))
}

/// GET /v1/events/:event_id
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event found", body = Event),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Event>, ApiError> {
    let event = state
        .events
        .get(event_id)
        .await
        .map_err(|e| store_error("Failed to get event", e))?
        .ok_or_else(|| not_found("Event"))?;

    Ok(Json(event))
}

/// GET /v1/events/:event_id/runs - Run history, oldest first
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}/runs",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Runs for the event", body = ListResponse<Run>),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn list_event_runs(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<ListResponse<Run>>, ApiError> {
    state
        .events
        .get(event_id)
        .await
        .map_err(|e| store_error("Failed to get event", e))?
        .ok_or_else(|| not_found("Event"))?;

    let runs = state
        .runs
        .list_for_event(event_id)
        .await
        .map_err(|e| store_error("Failed to list runs", e))?;

    Ok(Json(runs.into()))
}
