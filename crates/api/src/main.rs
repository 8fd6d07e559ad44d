// Switchyard API server
// Decision: The trigger endpoint runs the runner inline; long-lived polling is the worker's job
// Decision: Agent configuration is read-only here (no agent CRUD routes)

mod common;
mod events;
mod plugin_instances;
mod runner;
mod runs;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use switchyard_core::{
    Event, EventStatus, EventStore, OutcomeStatus, PluginState, PluginStateStore, Resolution,
    Run, RunOutcome, RunStatus, RunStore, Runner, RunnerConfig, ToolCallRecord,
};
use switchyard_storage::Database;
use switchyard_worker::{create_runner, RunnerDeps};

use crate::common::{ErrorResponse, ListResponse};

const DEFAULT_PORT: u16 = 9000;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        events::create_event,
        events::list_events,
        events::get_event,
        events::list_event_runs,
        runner::process,
        runs::get_run,
        plugin_instances::get_latest_analysis,
        plugin_instances::get_state,
    ),
    components(
        schemas(
            Event, EventStatus, Run, RunStatus, ToolCallRecord,
            RunOutcome, OutcomeStatus, Resolution, PluginState,
            events::CreateEventRequest,
            runner::ProcessRequest,
            ErrorResponse,
            ListResponse<Event>,
            ListResponse<Run>,
        )
    ),
    tags(
        (name = "events", description = "Enqueue and inspect events"),
        (name = "runner", description = "Trigger the runner"),
        (name = "runs", description = "Run records"),
        (name = "plugin-instances", description = "Per-instance state written by agents")
    ),
    info(
        title = "Switchyard API",
        version = "0.1.0",
        description = "Asynchronous agent task runner: event queue, runs and agent state",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

/// Everything the routes need
#[derive(Clone)]
pub struct ApiServices {
    pub events: Arc<dyn EventStore>,
    pub runs: Arc<dyn RunStore>,
    pub plugin_state: Arc<dyn PluginStateStore>,
    pub runner: Arc<Runner>,
}

impl ApiServices {
    fn from_deps(config: RunnerConfig, deps: &RunnerDeps) -> Self {
        Self {
            events: deps.stores.events.clone(),
            runs: deps.stores.runs.clone(),
            plugin_state: deps.stores.plugin_state.clone(),
            runner: Arc::new(create_runner(config, deps)),
        }
    }
}

fn build_app(services: ApiServices) -> Router {
    let api_routes = Router::new()
        .merge(events::routes(events::AppState {
            events: services.events.clone(),
            runs: services.runs.clone(),
        }))
        .merge(runner::routes(runner::AppState {
            runner: services.runner.clone(),
        }))
        .merge(runs::routes(runs::AppState {
            runs: services.runs.clone(),
        }))
        .merge(plugin_instances::routes(plugin_instances::AppState {
            plugin_state: services.plugin_state.clone(),
        }));

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchyard_api=debug,switchyard_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("switchyard-api starting...");

    let db = Database::from_env()
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    tracing::info!("Connected to database");

    let runner_config = RunnerConfig::from_env();
    tracing::info!(
        runner_id = %runner_config.runner_id,
        default_agent = %runner_config.default_agent_slug,
        "Runner configured"
    );
    let deps = RunnerDeps::from_env(&db)?;
    let app = build_app(ApiServices::from_deps(runner_config, &deps)).layer(TraceLayer::new_for_http());

    let port = std::env::var("API_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use switchyard_core::memory::{InMemoryBackend, MockModelClient};
    use switchyard_core::{AgentDefinition, ModelInvocationError};
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        app: Router,
        backend: InMemoryBackend,
        model: Arc<MockModelClient>,
    }

    fn test_app() -> TestApp {
        let backend = InMemoryBackend::new();
        backend.agents.insert(AgentDefinition::new(
            "lead_qualifier",
            "You qualify inbound leads.",
            ["crm.lead.create", "crm.pipeline.set_stage"],
        ));
        let model = Arc::new(MockModelClient::new());
        let deps = RunnerDeps::new(backend.runner_stores(), backend.tool_stores(), model.clone());
        let services =
            ApiServices::from_deps(RunnerConfig::default().with_runner_id("api-test"), &deps);
        TestApp {
            app: build_app(services),
            backend,
            model,
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let t = test_app();
        let (status, body) = send(&t.app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let t = test_app();
        let (status, body) = send(&t.app, "GET", "/api-doc/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/v1/runner/process"].is_object());
    }

    #[tokio::test]
    async fn test_enqueue_and_read_event() {
        let t = test_app();
        let (status, created) = send(
            &t.app,
            "POST",
            "/v1/events",
            Some(json!({
                "intent": "contact.submit",
                "payload": {"email": "a@b.com"},
                "businessId": "T1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["business_id"], "T1");

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = send(&t.app, "GET", &format!("/v1/events/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["intent"], "contact.submit");

        let (status, listed) = send(&t.app, "GET", "/v1/events?status=pending", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_blank_intent() {
        let t = test_app();
        let (status, body) = send(
            &t.app,
            "POST",
            "/v1/events",
            Some(json!({"intent": " ", "business_id": "T1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "intent is required");
        assert_eq!(t.backend.events.count(), 0);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_status() {
        let t = test_app();
        let (status, _) = send(&t.app, "GET", "/v1/events?status=done", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_idle_queue() {
        let t = test_app();
        let (status, body) = send(&t.app, "POST", "/v1/runner/process", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "idle"}));
    }

    #[tokio::test]
    async fn test_process_contact_submit_end_to_end() {
        let t = test_app();
        t.model.respond_with(json!({
            "score": 80,
            "proposedToolCalls": [
                {"tool": "crm.lead.create", "payload": {"name": "Ada", "email": "a@b.com"}}
            ]
        }));
        let (_, created) = send(
            &t.app,
            "POST",
            "/v1/events",
            Some(json!({
                "intent": "contact.submit",
                "payload": {"email": "a@b.com"},
                "business_id": "T1"
            })),
        )
        .await;
        let event_id = created["id"].as_str().unwrap().to_string();

        let (status, outcome) = send(&t.app, "POST", "/v1/runner/process", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["status"], "completed");
        assert_eq!(outcome["eventId"], event_id.as_str());
        assert_eq!(outcome["agent"], "lead_qualifier");
        assert_eq!(outcome["toolCalls"][0]["success"], true);
        assert_eq!(outcome["toolCalls"][0]["result"]["leadId"], "L1");

        let run_id = outcome["runId"].as_str().unwrap();
        let (status, run) = send(&t.app, "GET", &format!("/v1/runs/{run_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["status"], "completed");
        assert_eq!(run["tool_calls"].as_array().unwrap().len(), 1);

        let (status, event) = send(&t.app, "GET", &format!("/v1/events/{event_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(event["status"], "completed");

        let (_, runs) = send(&t.app, "GET", &format!("/v1/events/{event_id}/runs"), None).await;
        assert_eq!(runs["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_process_model_timeout_reports_failure() {
        let t = test_app();
        t.model
            .fail_with(ModelInvocationError::Timeout("after 60s".to_string()));
        send(
            &t.app,
            "POST",
            "/v1/events",
            Some(json!({"intent": "contact.submit", "business_id": "T1"})),
        )
        .await;

        let (status, outcome) = send(&t.app, "POST", "/v1/runner/process", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["status"], "failed");
        assert!(outcome["error"].as_str().unwrap().contains("timed out"));
        assert_eq!(outcome["toolCalls"], json!([]));
    }

    #[tokio::test]
    async fn test_process_explicit_event_id() {
        let t = test_app();
        let (_, created) = send(
            &t.app,
            "POST",
            "/v1/events",
            Some(json!({"intent": "contact.submit", "business_id": "T1"})),
        )
        .await;
        let event_id = created["id"].as_str().unwrap();

        let (status, outcome) = send(
            &t.app,
            "POST",
            "/v1/runner/process",
            Some(json!({"eventId": event_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["eventId"], event_id);
    }

    #[tokio::test]
    async fn test_process_unknown_event_is_not_found() {
        let t = test_app();
        let (status, body) = send(
            &t.app,
            "POST",
            "/v1/runner/process",
            Some(json!({"event_id": Uuid::now_v7()})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Event not found");
    }

    #[tokio::test]
    async fn test_process_malformed_body() {
        let t = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/runner/process")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = t.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_latest_analysis_read() {
        let t = test_app();
        let instance_id = Uuid::now_v7();

        let (status, _) = send(
            &t.app,
            "GET",
            &format!("/v1/plugin-instances/{instance_id}/analysis"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        t.model
            .respond_with(json!({"score": 80, "stage": "qualified", "notes": "warm"}));
        send(
            &t.app,
            "POST",
            "/v1/events",
            Some(json!({
                "intent": "contact.submit",
                "business_id": "T1",
                "plugin_instance_id": instance_id
            })),
        )
        .await;
        send(&t.app, "POST", "/v1/runner/process", None).await;

        let (status, state) = send(
            &t.app,
            "GET",
            &format!("/v1/plugin-instances/{instance_id}/analysis"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state["value"]["score"], 80.0);
        assert_eq!(state["value"]["stage"], "qualified");
    }
}
