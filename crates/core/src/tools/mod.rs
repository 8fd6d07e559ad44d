// Tool registry and execution
//
// Tools are the only path through which a model's proposal mutates state.
// Design decisions:
// - Tool identifiers are a closed enum; a registry cannot hold unknown tools
// - Handlers receive a ToolContext (tenant + plugin instance), never the raw
//   event or model output
// - The per-agent allow-list is checked at call time for every proposed call
// - A failing call is recorded and execution continues with the next call

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::agent::ResolvedAgent;
use crate::decision::{ProposedToolCall, INVALID_TOOL_CALL};
use crate::model::ToolSpec;
use crate::run::ToolCallRecord;
use crate::traits::{BookingStore, EventStore, LeadStore, NotificationStore, PluginStateStore};

pub mod agents;
pub mod calendar;
pub mod crm;
pub mod notify;
pub mod plugin_state;

pub use agents::{InvokeAgentTool, RouteAgentTool};
pub use calendar::{BookSlotTool, CheckAvailabilityTool};
pub use crm::{CreateLeadTool, SetPipelineStageTool};
pub use notify::EmitNotificationTool;
pub use plugin_state::PatchPluginStateTool;

/// Recorded when the proposed identifier names no registered handler
pub const UNKNOWN_TOOL: &str = "unknown tool";

/// Recorded when the resolved agent may not use the tool
pub const NOT_AUTHORIZED: &str = "not authorized";

/// Recorded when a proposed entry does not name a tool
pub const INVALID_CALL: &str = "invalid tool call";

// ============================================================================
// ToolId - closed set of tool identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolId {
    #[serde(rename = "crm.lead.create")]
    CrmLeadCreate,
    #[serde(rename = "crm.pipeline.set_stage")]
    CrmPipelineSetStage,
    #[serde(rename = "plugin.state.patch")]
    PluginStatePatch,
    #[serde(rename = "calendar.availability.check")]
    CalendarAvailabilityCheck,
    #[serde(rename = "calendar.slot.book")]
    CalendarSlotBook,
    #[serde(rename = "notify.emit")]
    NotifyEmit,
    #[serde(rename = "agent.route")]
    AgentRoute,
    #[serde(rename = "agent.invoke")]
    AgentInvoke,
}

impl ToolId {
    pub const ALL: [ToolId; 8] = [
        ToolId::CrmLeadCreate,
        ToolId::CrmPipelineSetStage,
        ToolId::PluginStatePatch,
        ToolId::CalendarAvailabilityCheck,
        ToolId::CalendarSlotBook,
        ToolId::NotifyEmit,
        ToolId::AgentRoute,
        ToolId::AgentInvoke,
    ];

    /// Wire name used in agent allow-lists and model proposals
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::CrmLeadCreate => "crm.lead.create",
            ToolId::CrmPipelineSetStage => "crm.pipeline.set_stage",
            ToolId::PluginStatePatch => "plugin.state.patch",
            ToolId::CalendarAvailabilityCheck => "calendar.availability.check",
            ToolId::CalendarSlotBook => "calendar.slot.book",
            ToolId::NotifyEmit => "notify.emit",
            ToolId::AgentRoute => "agent.route",
            ToolId::AgentInvoke => "agent.invoke",
        }
    }

    pub fn parse(name: &str) -> Option<ToolId> {
        ToolId::ALL.into_iter().find(|id| id.as_str() == name)
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::parse(s).ok_or_else(|| format!("unknown tool: {s}"))
    }
}

// ============================================================================
// Tool Execution Result
// ============================================================================

/// Result of one handler invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolExecutionResult {
    /// Successful execution with a JSON result
    Success(Value),

    /// Expected failure: validation, missing record, conflicting state
    ToolError(String),

    /// Infrastructure failure (store unavailable, serialization)
    InternalError(String),
}

impl ToolExecutionResult {
    pub fn success(value: impl Into<Value>) -> Self {
        ToolExecutionResult::Success(value.into())
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        ToolExecutionResult::InternalError(err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolExecutionResult::Success(_))
    }

    /// Convert into the record stored on the run
    pub fn into_record(self, tool: &str) -> ToolCallRecord {
        match self {
            ToolExecutionResult::Success(value) => ToolCallRecord::success(tool, value),
            ToolExecutionResult::ToolError(message) => ToolCallRecord::failure(tool, message),
            ToolExecutionResult::InternalError(message) => {
                error!(tool = %tool, error = %message, "Tool internal error");
                ToolCallRecord::failure(tool, message)
            }
        }
    }
}

// ============================================================================
// Tool trait
// ============================================================================

/// Tenant scope handed to every handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub business_id: String,
    pub plugin_instance_id: Option<Uuid>,
}

impl ToolContext {
    pub fn new(business_id: impl Into<String>, plugin_instance_id: Option<Uuid>) -> Self {
        Self {
            business_id: business_id.into(),
            plugin_instance_id,
        }
    }
}

/// A handler performing one bounded side effect.
///
/// A handler either returns a result or an error; it must not partially
/// apply a change and then report failure. Events may be processed more
/// than once, so handlers must tolerate being invoked again for the same
/// logical intent.
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> ToolId;

    /// Shown to the model alongside the parameter schema
    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value;

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.id().as_str().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

// ============================================================================
// ToolRegistry
// ============================================================================

/// Stores the built-in tools act on
#[derive(Clone)]
pub struct ToolStores {
    pub events: Arc<dyn EventStore>,
    pub leads: Arc<dyn LeadStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub plugin_state: Arc<dyn PluginStateStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<ToolId, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry holding every built-in tool
    pub fn with_builtins(stores: &ToolStores) -> Self {
        ToolRegistry::builder()
            .tool(CreateLeadTool::new(stores.leads.clone()))
            .tool(SetPipelineStageTool::new(stores.leads.clone()))
            .tool(PatchPluginStateTool::new(stores.plugin_state.clone()))
            .tool(CheckAvailabilityTool::new(stores.bookings.clone()))
            .tool(BookSlotTool::new(stores.bookings.clone()))
            .tool(EmitNotificationTool::new(stores.notifications.clone()))
            .tool(RouteAgentTool::new(stores.events.clone()))
            .tool(InvokeAgentTool::new(stores.events.clone()))
            .build()
    }

    /// Register a tool, replacing any tool with the same id
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.id(), Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.id(), tool);
    }

    pub fn get(&self, id: ToolId) -> Option<&Arc<dyn Tool>> {
        self.tools.get(&id)
    }

    pub fn has(&self, id: ToolId) -> bool {
        self.tools.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered ids in stable order
    pub fn ids(&self) -> Vec<ToolId> {
        let mut ids: Vec<ToolId> = self.tools.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Specs for the tools an agent may use, offered to the model
    pub fn specs_for(&self, agent: &ResolvedAgent) -> Vec<ToolSpec> {
        self.ids()
            .into_iter()
            .filter(|id| agent.allows(id.as_str()))
            .filter_map(|id| self.tools.get(&id).map(|t| t.spec()))
            .collect()
    }

    /// Execute proposed calls sequentially, in proposal order.
    ///
    /// Always yields one record per proposed call.
    pub async fn execute_proposed(
        &self,
        calls: &[ProposedToolCall],
        agent: &ResolvedAgent,
        context: &ToolContext,
    ) -> Vec<ToolCallRecord> {
        let mut records = Vec::with_capacity(calls.len());

        for call in calls {
            if call.is_invalid() {
                warn!(agent = %agent.slug, "Model proposed a malformed tool call");
                records.push(ToolCallRecord::failure(INVALID_TOOL_CALL, INVALID_CALL));
                continue;
            }

            let tool = ToolId::parse(&call.tool).and_then(|id| self.tools.get(&id));
            let Some(tool) = tool else {
                warn!(tool = %call.tool, agent = %agent.slug, "Model proposed unknown tool");
                records.push(ToolCallRecord::failure(&call.tool, UNKNOWN_TOOL));
                continue;
            };

            if !agent.allows(&call.tool) {
                warn!(tool = %call.tool, agent = %agent.slug, "Tool not in agent allow-list");
                records.push(ToolCallRecord::failure(&call.tool, NOT_AUTHORIZED));
                continue;
            }

            debug!(tool = %call.tool, agent = %agent.slug, "Executing tool");
            let result = tool.execute(call.payload.clone(), context).await;
            records.push(result.into_record(&call.tool));
        }

        records
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.ids())
            .finish()
    }
}

/// Builder for creating a ToolRegistry with a fluent API
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.registry.register(tool);
        self
    }

    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.registry.register_arc(tool);
        self
    }

    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Payload helpers
// ============================================================================

/// Non-empty string field
pub(crate) fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Payload as an object; null is treated as empty
pub(crate) fn object_payload(payload: &Value) -> Option<Map<String, Value>> {
    match payload {
        Value::Object(map) => Some(map.clone()),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDefinition, Resolution};
    use crate::memory::InMemoryBackend;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts invocations and fails if its payload asks it to
    struct CountingTool {
        id: ToolId,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn id(&self) -> ToolId {
            self.id
        }

        fn description(&self) -> &str {
            "counts calls"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, payload: Value, _context: &ToolContext) -> ToolExecutionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if payload.get("fail").and_then(Value::as_bool) == Some(true) {
                return ToolExecutionResult::tool_error("asked to fail");
            }
            ToolExecutionResult::success(json!({"ok": true}))
        }
    }

    /// Panics if invoked
    struct ForbiddenTool;

    #[async_trait]
    impl Tool for ForbiddenTool {
        fn id(&self) -> ToolId {
            ToolId::CalendarSlotBook
        }

        fn description(&self) -> &str {
            "must never run"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _payload: Value, _context: &ToolContext) -> ToolExecutionResult {
            panic!("handler invoked without authorization");
        }
    }

    fn agent(allowed: &[&str]) -> ResolvedAgent {
        ResolvedAgent::from_definition(
            AgentDefinition::new("tester", "prompt", allowed.iter().copied()),
            Resolution::Default,
        )
    }

    fn ctx() -> ToolContext {
        ToolContext::new("T1", None)
    }

    #[test]
    fn test_tool_id_wire_names_round_trip() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::parse(id.as_str()), Some(id));
            assert_eq!(serde_json::to_value(id).unwrap(), json!(id.as_str()));
        }
        assert_eq!(ToolId::parse("shell.exec"), None);
    }

    #[test]
    fn test_builtin_registry_has_every_tool() {
        let backend = InMemoryBackend::new();
        let registry = ToolRegistry::with_builtins(&backend.tool_stores());
        assert_eq!(registry.len(), ToolId::ALL.len());
        assert_eq!(registry.ids(), ToolId::ALL.to_vec());
    }

    #[test]
    fn test_specs_only_cover_allowed_tools() {
        let backend = InMemoryBackend::new();
        let registry = ToolRegistry::with_builtins(&backend.tool_stores());
        let specs = registry.specs_for(&agent(&["notify.emit", "shell.exec"]));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "notify.emit");
    }

    #[tokio::test]
    async fn test_unauthorized_call_never_invokes_handler() {
        let registry = ToolRegistry::builder().tool(ForbiddenTool).build();
        let calls = vec![ProposedToolCall::new("calendar.slot.book", json!({}))];

        let records = registry
            .execute_proposed(&calls, &agent(&["crm.lead.create"]), &ctx())
            .await;

        assert_eq!(records, vec![ToolCallRecord::failure("calendar.slot.book", NOT_AUTHORIZED)]);
    }

    #[tokio::test]
    async fn test_unknown_and_unregistered_tools() {
        let registry = ToolRegistry::new();
        let calls = vec![
            ProposedToolCall::new("shell.exec", json!({})),
            ProposedToolCall::new("notify.emit", json!({"message": "hi"})),
        ];

        let records = registry
            .execute_proposed(&calls, &agent(&["shell.exec", "notify.emit"]), &ctx())
            .await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.error.as_deref() == Some(UNKNOWN_TOOL)));
    }

    #[tokio::test]
    async fn test_invalid_call_is_recorded_and_siblings_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::builder()
            .tool(CountingTool {
                id: ToolId::NotifyEmit,
                calls: counter.clone(),
            })
            .build();
        let calls = vec![
            ProposedToolCall::invalid(),
            ProposedToolCall::new("notify.emit", json!({})),
        ];

        let records = registry
            .execute_proposed(&calls, &agent(&["notify.emit"]), &ctx())
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(records[0], ToolCallRecord::failure(INVALID_TOOL_CALL, INVALID_CALL));
        assert!(records[1].success);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_calls() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::builder()
            .tool(CountingTool {
                id: ToolId::NotifyEmit,
                calls: counter.clone(),
            })
            .build();
        let calls = vec![
            ProposedToolCall::new("notify.emit", json!({})),
            ProposedToolCall::new("notify.emit", json!({"fail": true})),
            ProposedToolCall::new("notify.emit", json!({})),
        ];

        let records = registry
            .execute_proposed(&calls, &agent(&["notify.emit"]), &ctx())
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            records.iter().map(|r| r.success).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(records[1].error.as_deref(), Some("asked to fail"));
    }

    #[test]
    fn test_internal_error_is_recorded_as_failure() {
        let record = ToolExecutionResult::internal_error("connection reset").into_record("crm.lead.create");
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("connection reset"));
    }
}
