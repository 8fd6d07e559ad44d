// CRM tools: lead creation and pipeline stage changes

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{object_payload, str_field, Tool, ToolContext, ToolExecutionResult, ToolId};
use crate::records::NewLead;
use crate::traits::LeadStore;

const LEAD_FIELDS: [&str; 6] = ["name", "email", "phone", "source", "stage", "notes"];

/// Inserts a tenant-scoped lead
pub struct CreateLeadTool {
    leads: Arc<dyn LeadStore>,
}

impl CreateLeadTool {
    pub fn new(leads: Arc<dyn LeadStore>) -> Self {
        Self { leads }
    }
}

#[async_trait]
impl Tool for CreateLeadTool {
    fn id(&self) -> ToolId {
        ToolId::CrmLeadCreate
    }

    fn description(&self) -> &str {
        "Create a lead in the CRM for this business. Unrecognized fields are kept as lead data."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "email": {"type": "string"},
                "phone": {"type": "string"},
                "source": {"type": "string", "description": "Where the lead came from"},
                "stage": {"type": "string", "description": "Initial pipeline stage (default: new)"},
                "notes": {"type": "string"}
            }
        })
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let Some(mut data) = object_payload(&payload) else {
            return ToolExecutionResult::tool_error("payload must be an object");
        };
        let input = NewLead {
            business_id: context.business_id.clone(),
            name: str_field(&payload, "name"),
            email: str_field(&payload, "email"),
            phone: str_field(&payload, "phone"),
            source: str_field(&payload, "source"),
            stage: str_field(&payload, "stage"),
            notes: str_field(&payload, "notes"),
            data: {
                data.retain(|k, _| !LEAD_FIELDS.contains(&k.as_str()));
                Value::Object(data)
            },
        };

        match self.leads.create(input).await {
            Ok(lead) => ToolExecutionResult::success(json!({"leadId": lead.id, "success": true})),
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

/// Moves an existing lead to another pipeline stage
pub struct SetPipelineStageTool {
    leads: Arc<dyn LeadStore>,
}

impl SetPipelineStageTool {
    pub fn new(leads: Arc<dyn LeadStore>) -> Self {
        Self { leads }
    }
}

#[async_trait]
impl Tool for SetPipelineStageTool {
    fn id(&self) -> ToolId {
        ToolId::CrmPipelineSetStage
    }

    fn description(&self) -> &str {
        "Set the pipeline stage of an existing lead."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "leadId": {"type": "string"},
                "stage": {"type": "string"}
            },
            "required": ["leadId", "stage"]
        })
    }

    async fn execute(&self, payload: Value, context: &ToolContext) -> ToolExecutionResult {
        let Some(lead_id) = str_field(&payload, "leadId") else {
            return ToolExecutionResult::tool_error("leadId is required");
        };
        let Some(stage) = str_field(&payload, "stage") else {
            return ToolExecutionResult::tool_error("stage is required");
        };

        match self
            .leads
            .set_stage(&context.business_id, &lead_id, &stage)
            .await
        {
            Ok(Some(lead)) => ToolExecutionResult::success(json!({
                "leadId": lead.id,
                "stage": lead.stage,
                "success": true
            })),
            Ok(None) => ToolExecutionResult::tool_error(format!("lead not found: {lead_id}")),
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLeadStore;

    #[tokio::test]
    async fn test_create_lead_returns_sequential_id() {
        let leads = Arc::new(InMemoryLeadStore::new());
        let tool = CreateLeadTool::new(leads.clone());
        let ctx = ToolContext::new("T1", None);

        let result = tool
            .execute(json!({"name": "Ada", "email": "a@b.com", "budget": 5000}), &ctx)
            .await;

        assert_eq!(
            result,
            ToolExecutionResult::Success(json!({"leadId": "L1", "success": true}))
        );
        let stored = leads.all();
        assert_eq!(stored[0].business_id, "T1");
        assert_eq!(stored[0].stage, "new");
        assert_eq!(stored[0].data, json!({"budget": 5000}));
    }

    #[tokio::test]
    async fn test_set_stage_requires_lead_id() {
        let tool = SetPipelineStageTool::new(Arc::new(InMemoryLeadStore::new()));
        let result = tool
            .execute(json!({"stage": "won"}), &ToolContext::new("T1", None))
            .await;
        assert_eq!(result, ToolExecutionResult::tool_error("leadId is required"));
    }

    #[tokio::test]
    async fn test_set_stage_is_tenant_scoped() {
        let leads = Arc::new(InMemoryLeadStore::new());
        CreateLeadTool::new(leads.clone())
            .execute(json!({"name": "Ada"}), &ToolContext::new("T1", None))
            .await;
        let tool = SetPipelineStageTool::new(leads.clone());

        let other_tenant = tool
            .execute(
                json!({"leadId": "L1", "stage": "won"}),
                &ToolContext::new("T2", None),
            )
            .await;
        assert!(matches!(other_tenant, ToolExecutionResult::ToolError(_)));

        let own_tenant = tool
            .execute(
                json!({"leadId": "L1", "stage": "won"}),
                &ToolContext::new("T1", None),
            )
            .await;
        assert_eq!(
            own_tenant,
            ToolExecutionResult::Success(json!({"leadId": "L1", "stage": "won", "success": true}))
        );
    }
}
