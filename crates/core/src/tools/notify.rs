// Notification tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{str_field, Tool, ToolContext, ToolExecutionResult, ToolId};
use crate::records::NewNotification;
use crate::traits::NotificationStore;

const DEFAULT_CHANNEL: &str = "in_app";

/// Records a notification for the business owner
pub struct EmitNotificationTool {
    notifications: Arc<dyn NotificationStore>,
}

impl EmitNotificationTool {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl Tool for EmitNotificationTool {
    fn id(&self) -> ToolId {
        ToolId::NotifyEmit
    }

    fn description(&self) -> &str {
        "Send a notification to the business (in-app by default)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"},
                "subject": {"type": "string"},
                "channel": {"type": "string", "default": DEFAULT_CHANNEL},
                "recipient": {"type": "string"}
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let Some(message) = str_field(&payload, "message") else {
            return ToolExecutionResult::tool_error("message is required");
        };
        let input = NewNotification {
            business_id: context.business_id.clone(),
            channel: str_field(&payload, "channel").unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            recipient: str_field(&payload, "recipient"),
            subject: str_field(&payload, "subject"),
            message,
        };

        match self.notifications.create(input).await {
            Ok(n) => ToolExecutionResult::success(json!({"notificationId": n.id, "success": true})),
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryNotificationStore;

    #[tokio::test]
    async fn test_emit_records_tenant_notification() {
        let store = Arc::new(InMemoryNotificationStore::new());
        let tool = EmitNotificationTool::new(store.clone());

        let result = tool
            .execute(
                json!({"message": "New qualified lead", "subject": "Lead"}),
                &ToolContext::new("T1", None),
            )
            .await;

        assert!(result.is_success());
        let stored = store.list_for_business("T1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].channel, "in_app");
        assert!(store.list_for_business("T2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emit_requires_message() {
        let tool = EmitNotificationTool::new(Arc::new(InMemoryNotificationStore::new()));
        let result = tool.execute(json!({}), &ToolContext::new("T1", None)).await;
        assert_eq!(result, ToolExecutionResult::tool_error("message is required"));
    }
}
