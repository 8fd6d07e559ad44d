// Run HTTP routes (read-only; runs are written by the runner)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use switchyard_core::{Run, RunStore};

use crate::common::{not_found, store_error, ApiError, ErrorResponse};

#[derive(Clone)]
pub struct AppState {
    pub runs: Arc<dyn RunStore>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/runs/:run_id", get(get_run))
        .with_state(state)
}

/// GET /v1/runs/:run_id
#[utoipa::path(
    get,
    path = "/v1/runs/{run_id}",
    params(("run_id" = Uuid, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run found", body = Run),
        (status = 404, description = "Run not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "runs"
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Run>, ApiError> {
    let run = state
        .runs
        .get(run_id)
        .await
        .map_err(|e| store_error("Failed to get run", e))?
        .ok_or_else(|| not_found("Run"))?;

    Ok(Json(run))
}
