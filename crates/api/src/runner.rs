// Trigger route: process one event on demand

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use switchyard_core::{RunOutcome, Runner, RunnerError};

use crate::common::{bad_request, error, not_found, ApiError, ErrorResponse};

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<Runner>,
}

/// Optional trigger body; without an event id the next claimable event is processed
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProcessRequest {
    #[serde(default, alias = "eventId")]
    pub event_id: Option<Uuid>,
}

impl ProcessRequest {
    /// An empty body means "process the next event"
    fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid request body: {e}")))
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/runner/process", post(process))
        .with_state(state)
}

/// POST /v1/runner/process - Run the runner once
///
/// Model and tool failures are reported in the summary with status 200; only
/// an unknown explicit event id or a store failure is an HTTP error.
#[utoipa::path(
    post,
    path = "/v1/runner/process",
    request_body = ProcessRequest,
    responses(
        (status = 200, description = "Run summary (idle, completed or failed)", body = RunOutcome),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "runner"
)]
pub async fn process(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RunOutcome>, ApiError> {
    let request = ProcessRequest::from_body(&body)?;

    match state.runner.process(request.event_id).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(RunnerError::EventNotFound(_)) => Err(not_found("Event")),
        Err(e) => {
            tracing::error!(error = %e, event_id = ?request.event_id, "Runner invocation failed");
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"))
        }
    }
}
