// Runner - processes one event per invocation
//
// Idle -> Claimed -> Reasoning -> Acting -> Finalized(completed | failed)
//
// The runner holds no shared mutable state. Concurrency comes from invoking
// it from several tasks or processes; they coordinate only through the
// event store's atomic claim. There is no cancellation: a claimed event
// either finalizes or is abandoned and reclaimed after its lease expires.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::agent::{Resolution, ResolvedAgent};
use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::event::{ClaimedEvent, EventStatus};
use crate::model::{ModelClient, ModelInput};
use crate::records::LATEST_ANALYSIS_KEY;
use crate::routing::AgentResolver;
use crate::run::{NewRun, RunCompletion, ToolCallRecord};
use crate::tools::{ToolContext, ToolRegistry};
use crate::traits::{AgentStore, EventStore, PluginStateStore, RunStore};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Stores the runner reads and writes directly
#[derive(Clone)]
pub struct RunnerStores {
    pub events: Arc<dyn EventStore>,
    pub runs: Arc<dyn RunStore>,
    pub agents: Arc<dyn AgentStore>,
    pub plugin_state: Arc<dyn PluginStateStore>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Idle,
    Completed,
    Failed,
}

/// Summary returned to whoever triggered the runner
#[derive(Debug, Clone, Serialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// The model's decision as returned
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn idle() -> Self {
        Self {
            status: OutcomeStatus::Idle,
            event_id: None,
            run_id: None,
            agent: None,
            resolution: None,
            result: None,
            tool_calls: None,
            latency_ms: None,
            tokens_used: None,
            error: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == OutcomeStatus::Idle
    }
}

pub struct Runner {
    config: RunnerConfig,
    events: Arc<dyn EventStore>,
    runs: Arc<dyn RunStore>,
    plugin_state: Arc<dyn PluginStateStore>,
    resolver: AgentResolver,
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        stores: RunnerStores,
        model: Arc<dyn ModelClient>,
        tools: ToolRegistry,
    ) -> Self {
        let resolver = AgentResolver::new(
            stores.agents,
            config.default_agent_slug.clone(),
            config.orchestrator_slug.clone(),
        );
        Self {
            config,
            events: stores.events,
            runs: stores.runs,
            plugin_state: stores.plugin_state,
            resolver,
            model,
            tools,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Process one event.
    ///
    /// With `None`, claims the oldest claimable event and returns an idle
    /// outcome when there is none. With an explicit id, claims that event
    /// whatever its status; an unknown id is [`RunnerError::EventNotFound`].
    ///
    /// Model and tool failures are reported in the outcome. `Err` means the
    /// store failed; an event claimed before such a failure is recovered by
    /// lease expiry.
    #[instrument(skip(self), fields(runner_id = %self.config.runner_id))]
    pub async fn process(&self, event_id: Option<Uuid>) -> Result<RunOutcome> {
        let claimed = match event_id {
            Some(id) => self
                .events
                .claim_by_id(id, &self.config.runner_id)
                .await?
                .ok_or(RunnerError::EventNotFound(id))?,
            None => match self
                .events
                .claim_next(&self.config.runner_id, self.config.lease_timeout)
                .await?
            {
                Some(claimed) => claimed,
                None => return Ok(RunOutcome::idle()),
            },
        };

        if claimed.previous_status != EventStatus::Pending {
            info!(
                event_id = %claimed.event.id,
                previous_status = %claimed.previous_status,
                "Re-processing event"
            );
        }

        self.execute(claimed).await
    }

    async fn execute(&self, claimed: ClaimedEvent) -> Result<RunOutcome> {
        let started = Instant::now();
        let event = &claimed.event;

        let run = self
            .runs
            .create(NewRun {
                event_id: event.id,
                input_payload: event.payload.clone(),
            })
            .await?;

        let agent = self.resolver.resolve(event).await;
        info!(
            event_id = %event.id,
            run_id = %run.id,
            intent = %event.intent,
            agent = %agent.slug,
            resolution = %agent.resolution,
            "Claimed event"
        );

        let input = ModelInput {
            intent: event.intent.clone(),
            payload: event.payload.clone(),
            business_id: event.business_id.clone(),
            tools: self.tools.specs_for(&agent),
        };

        let response = match self.model.invoke(&agent.system_prompt, &input).await {
            Ok(response) => response,
            Err(err) => {
                let latency_ms = elapsed_ms(started);
                let message = err.to_string();
                warn!(event_id = %event.id, run_id = %run.id, error = %message, "Model invocation failed");

                self.runs
                    .complete(
                        run.id,
                        RunCompletion::failed(Some(agent.slug.clone()), &message, latency_ms),
                    )
                    .await?;
                self.finalize(&claimed, EventStatus::Failed, run.id).await?;

                return Ok(RunOutcome {
                    status: OutcomeStatus::Failed,
                    event_id: Some(event.id),
                    run_id: Some(run.id),
                    agent: Some(agent.slug),
                    resolution: Some(agent.resolution),
                    result: None,
                    tool_calls: Some(Vec::new()),
                    latency_ms: Some(latency_ms),
                    tokens_used: None,
                    error: Some(message),
                });
            }
        };

        let context = ToolContext::new(event.business_id.clone(), event.plugin_instance_id);
        let tool_calls = self
            .tools
            .execute_proposed(&response.decision.proposed_tool_calls, &agent, &context)
            .await;

        if let Some(instance_id) = event.plugin_instance_id {
            let snapshot = response
                .decision
                .analysis_snapshot(event.id, chrono::Utc::now());
            if let Err(e) = self
                .plugin_state
                .put(instance_id, &event.business_id, LATEST_ANALYSIS_KEY, snapshot)
                .await
            {
                warn!(event_id = %event.id, plugin_instance_id = %instance_id, error = %e, "Failed to store latest analysis");
            }
        }

        let latency_ms = elapsed_ms(started);
        self.runs
            .complete(
                run.id,
                RunCompletion::completed(
                    agent.slug.clone(),
                    response.raw.clone(),
                    tool_calls.clone(),
                    latency_ms,
                    response.tokens_used,
                ),
            )
            .await?;
        self.finalize(&claimed, EventStatus::Completed, run.id).await?;

        let succeeded = tool_calls.iter().filter(|c| c.success).count();
        info!(
            event_id = %event.id,
            run_id = %run.id,
            agent = %agent.slug,
            tool_calls = tool_calls.len(),
            tool_calls_succeeded = succeeded,
            latency_ms,
            "Run completed"
        );

        Ok(self.completed_outcome(
            &claimed,
            run.id,
            agent,
            response.raw,
            tool_calls,
            latency_ms,
            response.tokens_used,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn completed_outcome(
        &self,
        claimed: &ClaimedEvent,
        run_id: Uuid,
        agent: ResolvedAgent,
        result: Value,
        tool_calls: Vec<ToolCallRecord>,
        latency_ms: i64,
        tokens_used: Option<i64>,
    ) -> RunOutcome {
        RunOutcome {
            status: OutcomeStatus::Completed,
            event_id: Some(claimed.event.id),
            run_id: Some(run_id),
            agent: Some(agent.slug),
            resolution: Some(agent.resolution),
            result: Some(result),
            tool_calls: Some(tool_calls),
            latency_ms: Some(latency_ms),
            tokens_used,
            error: None,
        }
    }

    /// Finalize under the claim's lease. A lost lease is logged, not raised.
    async fn finalize(&self, claimed: &ClaimedEvent, status: EventStatus, run_id: Uuid) -> Result<bool> {
        let applied = self
            .events
            .finalize(claimed.event.id, &claimed.lease, status, run_id)
            .await?;
        if !applied {
            warn!(
                event_id = %claimed.event.id,
                run_id = %run_id,
                status = %status,
                "Lease lost before finalization; event left to its current holder"
            );
        }
        Ok(applied)
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
