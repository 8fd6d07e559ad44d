// Plugin state tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{object_payload, Tool, ToolContext, ToolExecutionResult, ToolId};
use crate::records::STATE_KEY;
use crate::traits::PluginStateStore;

/// Shallow-merges a partial update into the plugin instance's state.
///
/// Events without a plugin instance are skipped, not failed.
pub struct PatchPluginStateTool {
    state: Arc<dyn PluginStateStore>,
}

impl PatchPluginStateTool {
    pub fn new(state: Arc<dyn PluginStateStore>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for PatchPluginStateTool {
    fn id(&self) -> ToolId {
        ToolId::PluginStatePatch
    }

    fn description(&self) -> &str {
        "Merge fields into the persistent state of the plugin instance attached to this event."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "description": "Top-level fields to set; existing fields not mentioned are kept",
            "additionalProperties": true
        })
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let Some(instance_id) = context.plugin_instance_id else {
            return ToolExecutionResult::success(json!({
                "skipped": true,
                "reason": "no plugin instance associated with event"
            }));
        };
        let Some(patch) = object_payload(&payload) else {
            return ToolExecutionResult::tool_error("payload must be an object");
        };

        match self
            .state
            .merge(instance_id, &context.business_id, STATE_KEY, patch)
            .await
        {
            Ok(merged) => ToolExecutionResult::success(json!({
                "state": merged.value,
                "success": true
            })),
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryPluginStateStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_skips_without_plugin_instance() {
        let store = Arc::new(InMemoryPluginStateStore::new());
        let tool = PatchPluginStateTool::new(store);

        let result = tool
            .execute(json!({"step": 2}), &ToolContext::new("T1", None))
            .await;

        assert!(matches!(result, ToolExecutionResult::Success(ref v) if v["skipped"] == true));
    }

    #[tokio::test]
    async fn test_merges_into_existing_state() {
        let store = Arc::new(InMemoryPluginStateStore::new());
        let instance = Uuid::now_v7();
        let tool = PatchPluginStateTool::new(store.clone());
        let ctx = ToolContext::new("T1", Some(instance));

        tool.execute(json!({"step": 1, "theme": "dark"}), &ctx).await;
        let result = tool.execute(json!({"step": 2}), &ctx).await;

        assert_eq!(
            result,
            ToolExecutionResult::Success(json!({
                "state": {"step": 2, "theme": "dark"},
                "success": true
            }))
        );
        let stored = store.get(instance, STATE_KEY).await.unwrap().unwrap();
        assert_eq!(stored.business_id, "T1");
    }

    #[tokio::test]
    async fn test_cannot_patch_another_tenants_state() {
        let store = Arc::new(InMemoryPluginStateStore::new());
        let instance = Uuid::now_v7();
        let tool = PatchPluginStateTool::new(store.clone());

        tool.execute(json!({"step": 1}), &ToolContext::new("T1", Some(instance)))
            .await;
        let result = tool
            .execute(json!({"step": 5}), &ToolContext::new("T2", Some(instance)))
            .await;

        assert!(matches!(result, ToolExecutionResult::InternalError(_)));
        let stored = store.get(instance, STATE_KEY).await.unwrap().unwrap();
        assert_eq!(stored.value, json!({"step": 1}));
    }

    #[tokio::test]
    async fn test_rejects_non_object_patch() {
        let tool = PatchPluginStateTool::new(Arc::new(InMemoryPluginStateStore::new()));
        let result = tool
            .execute(json!([1, 2]), &ToolContext::new("T1", Some(Uuid::now_v7())))
            .await;
        assert!(matches!(result, ToolExecutionResult::ToolError(_)));
    }
}
