// Plugin instance state routes
//
// Exposes the latest analysis snapshot so UIs can show the most recent
// decision without re-running the agent.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use switchyard_core::records::{LATEST_ANALYSIS_KEY, STATE_KEY};
use switchyard_core::{PluginState, PluginStateStore};

use crate::common::{not_found, store_error, ApiError, ErrorResponse};

#[derive(Clone)]
pub struct AppState {
    pub plugin_state: Arc<dyn PluginStateStore>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/plugin-instances/:instance_id/analysis",
            get(get_latest_analysis),
        )
        .route("/v1/plugin-instances/:instance_id/state", get(get_state))
        .with_state(state)
}

async fn read_key(state: &AppState, instance_id: Uuid, key: &str) -> Result<PluginState, ApiError> {
    state
        .plugin_state
        .get(instance_id, key)
        .await
        .map_err(|e| store_error("Failed to read plugin state", e))?
        .ok_or_else(|| not_found("Plugin state"))
}

/// GET /v1/plugin-instances/:instance_id/analysis
#[utoipa::path(
    get,
    path = "/v1/plugin-instances/{instance_id}/analysis",
    params(("instance_id" = Uuid, Path, description = "Plugin instance ID")),
    responses(
        (status = 200, description = "Latest analysis snapshot", body = PluginState),
        (status = 404, description = "No analysis recorded yet", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "plugin-instances"
)]
pub async fn get_latest_analysis(
    State(state): State<AppState>,
    Path(instance_id): Path<Uuid>,
) -> Result<Json<PluginState>, ApiError> {
    read_key(&state, instance_id, LATEST_ANALYSIS_KEY).await.map(Json)
}

/// GET /v1/plugin-instances/:instance_id/state
#[utoipa::path(
    get,
    path = "/v1/plugin-instances/{instance_id}/state",
    params(("instance_id" = Uuid, Path, description = "Plugin instance ID")),
    responses(
        (status = 200, description = "State patched by agents", body = PluginState),
        (status = 404, description = "No state recorded yet", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "plugin-instances"
)]
pub async fn get_state(
    State(state): State<AppState>,
    Path(instance_id): Path<Uuid>,
) -> Result<Json<PluginState>, ApiError> {
    read_key(&state, instance_id, STATE_KEY).await.map(Json)
}
