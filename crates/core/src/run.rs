// Run domain types
//
// A Run is the audit record of one execution attempt against an event.
// Created in `processing` when the event is claimed, finalized exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Run status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(RunStatus::Processing),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Outcome of one proposed tool call, as recorded in the run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ToolCallRecord {
    /// Tool identifier exactly as proposed by the model
    pub tool: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallRecord {
    pub fn success(tool: impl Into<String>, result: Value) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Immutable audit record of an execution attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Run {
    pub id: Uuid,
    pub event_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_slug: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub input_payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub output_payload: Option<Value>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a run at claim time
#[derive(Debug, Clone)]
pub struct NewRun {
    pub event_id: Uuid,
    /// Snapshot of the event payload at execution time
    pub input_payload: Value,
}

/// The single completion update applied to a run
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub agent_slug: Option<String>,
    pub output_payload: Option<Value>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub error_message: Option<String>,
    pub latency_ms: i64,
    pub tokens_used: Option<i64>,
}

impl RunCompletion {
    pub fn completed(
        agent_slug: impl Into<String>,
        output_payload: Value,
        tool_calls: Vec<ToolCallRecord>,
        latency_ms: i64,
        tokens_used: Option<i64>,
    ) -> Self {
        Self {
            status: RunStatus::Completed,
            agent_slug: Some(agent_slug.into()),
            output_payload: Some(output_payload),
            tool_calls,
            error_message: None,
            latency_ms,
            tokens_used,
        }
    }

    pub fn failed(agent_slug: Option<String>, error_message: impl Into<String>, latency_ms: i64) -> Self {
        Self {
            status: RunStatus::Failed,
            agent_slug,
            output_payload: None,
            tool_calls: Vec::new(),
            error_message: Some(error_message.into()),
            latency_ms,
            tokens_used: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_record_serializes_result_or_error() {
        let ok = ToolCallRecord::success("crm.lead.create", json!({"leadId": "L1"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"tool": "crm.lead.create", "success": true, "result": {"leadId": "L1"}})
        );

        let err = ToolCallRecord::failure("calendar.slot.book", "not authorized");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"tool": "calendar.slot.book", "success": false, "error": "not authorized"})
        );
    }

    #[test]
    fn test_failed_completion_has_no_tool_calls() {
        let completion = RunCompletion::failed(None, "model timed out", 12);
        assert_eq!(completion.status, RunStatus::Failed);
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.error_message.as_deref(), Some("model timed out"));
    }
}
