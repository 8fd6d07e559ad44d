// Multi-agent chaining
//
// Both tools enqueue a brand-new pending event. The downstream agent runs
// only when a runner claims that event; there is no direct recursive call.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{str_field, Tool, ToolContext, ToolExecutionResult, ToolId};
use crate::event::NewEvent;
use crate::traits::EventStore;

/// Intent stamped on `agent.invoke` events when the caller gives none
pub const INVOKE_INTENT: &str = "agent.invoke";

fn chained_event(intent: String, payload: &Value, context: &ToolContext) -> NewEvent {
    NewEvent {
        intent,
        payload: payload.get("payload").cloned().unwrap_or_else(|| json!({})),
        business_id: context.business_id.clone(),
        plugin_instance_id: context.plugin_instance_id,
        target_agent: None,
    }
}

/// Hands work to whichever agent the orchestrator routes `intent` to
pub struct RouteAgentTool {
    events: Arc<dyn EventStore>,
}

impl RouteAgentTool {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Tool for RouteAgentTool {
    fn id(&self) -> ToolId {
        ToolId::AgentRoute
    }

    fn description(&self) -> &str {
        "Queue a follow-up event with the given intent for routing to the responsible agent."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string"},
                "payload": {"type": "object"}
            },
            "required": ["intent"]
        })
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let Some(intent) = str_field(&payload, "intent") else {
            return ToolExecutionResult::tool_error("intent is required");
        };

        match self
            .events
            .enqueue(chained_event(intent, &payload, context))
            .await
        {
            Ok(event) => {
                info!(event_id = %event.id, intent = %event.intent, "Queued routed event");
                ToolExecutionResult::success(json!({
                    "eventId": event.id,
                    "intent": event.intent,
                    "success": true
                }))
            }
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

/// Hands work to a specific agent by slug
pub struct InvokeAgentTool {
    events: Arc<dyn EventStore>,
}

impl InvokeAgentTool {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Tool for InvokeAgentTool {
    fn id(&self) -> ToolId {
        ToolId::AgentInvoke
    }

    fn description(&self) -> &str {
        "Queue a follow-up event addressed to a specific agent."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent": {"type": "string", "description": "Slug of the agent to invoke"},
                "intent": {"type": "string", "default": INVOKE_INTENT},
                "payload": {"type": "object"}
            },
            "required": ["agent"]
        })
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let Some(agent) = str_field(&payload, "agent") else {
            return ToolExecutionResult::tool_error("agent is required");
        };
        let intent = str_field(&payload, "intent").unwrap_or_else(|| INVOKE_INTENT.to_string());
        let input = chained_event(intent, &payload, context).with_target_agent(agent);

        match self.events.enqueue(input).await {
            Ok(event) => {
                info!(event_id = %event.id, agent = ?event.target_agent, "Queued agent invocation");
                ToolExecutionResult::success(json!({
                    "eventId": event.id,
                    "agent": event.target_agent,
                    "success": true
                }))
            }
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}
