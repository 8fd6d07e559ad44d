// Structured model decision
//
// Every field is optional: a model that omits fields still produces a valid
// decision. Only output that is not a JSON object is rejected. A field with
// the wrong shape is dropped from the typed view and kept in `extra`, and a
// malformed entry in `proposedToolCalls` becomes an invalid call that is
// recorded as failed without affecting its siblings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::model::ModelInvocationError;

/// Tool name recorded for a proposed call that has no string `tool`
pub const INVALID_TOOL_CALL: &str = "<invalid>";

/// A tool call proposed by the model. Never executed by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedToolCall {
    pub tool: String,
    #[serde(default)]
    pub payload: Value,
}

impl ProposedToolCall {
    pub fn new(tool: impl Into<String>, payload: Value) -> Self {
        Self {
            tool: tool.into(),
            payload,
        }
    }

    /// Placeholder for an entry the model got wrong
    pub fn invalid() -> Self {
        Self::new(INVALID_TOOL_CALL, Value::Null)
    }

    pub fn is_invalid(&self) -> bool {
        self.tool == INVALID_TOOL_CALL
    }

    fn from_entry(entry: &Value) -> Self {
        match entry.get("tool").and_then(Value::as_str) {
            Some(tool) if !tool.trim().is_empty() => Self::new(
                tool,
                entry.get("payload").cloned().unwrap_or(Value::Null),
            ),
            _ => Self::invalid(),
        }
    }
}

/// The model's decision for one event
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proposed_tool_calls: Vec<ProposedToolCall>,
    /// Fields the runner does not interpret, or could not read, preserved for
    /// the audit trail
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for AgentDecision {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Numbers, or strings holding a finite number
fn read_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn read_tags(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|tag| tag.as_str().map(str::to_string))
        .collect()
}

fn read_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn read_tool_calls(value: &Value) -> Option<Vec<ProposedToolCall>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(entries) => Some(entries.iter().map(ProposedToolCall::from_entry).collect()),
        _ => None,
    }
}

impl AgentDecision {
    /// Parse the textual content of a model reply
    pub fn parse(content: &str) -> Result<(Self, Value), ModelInvocationError> {
        let value: Value = serde_json::from_str(content.trim())
            .map_err(|e| ModelInvocationError::Parse(format!("model output is not JSON: {e}")))?;
        let decision = Self::from_value(&value)?;
        Ok((decision, value))
    }

    pub fn from_value(value: &Value) -> Result<Self, ModelInvocationError> {
        let Value::Object(fields) = value else {
            return Err(ModelInvocationError::Parse(
                "model output is not a JSON object".to_string(),
            ));
        };

        let mut decision = Self::default();
        for (key, field) in fields {
            let understood = match key.as_str() {
                "score" => {
                    decision.score = read_score(field);
                    decision.score.is_some()
                }
                "tags" => {
                    decision.tags = read_tags(field);
                    decision.tags.is_some()
                }
                "stage" => {
                    decision.stage = read_string(field);
                    decision.stage.is_some()
                }
                "outcome" => {
                    decision.outcome = read_string(field);
                    decision.outcome.is_some()
                }
                "notes" => {
                    decision.notes = read_string(field);
                    decision.notes.is_some()
                }
                "action" => {
                    decision.action = read_string(field);
                    decision.action.is_some()
                }
                "proposedToolCalls" | "proposed_tool_calls" => match read_tool_calls(field) {
                    Some(calls) => {
                        decision.proposed_tool_calls.extend(calls);
                        true
                    }
                    None => false,
                },
                _ => {
                    decision.extra.insert(key.clone(), field.clone());
                    true
                }
            };
            // A mistyped field stays visible in the audit trail
            if !understood && !field.is_null() {
                decision.extra.insert(key.clone(), field.clone());
            }
        }
        Ok(decision)
    }

    /// The "latest analysis" snapshot stored per plugin instance
    pub fn analysis_snapshot(&self, event_id: Uuid, at: DateTime<Utc>) -> Value {
        json!({
            "score": self.score,
            "tags": self.tags,
            "stage": self.stage,
            "outcome": self.outcome,
            "action": self.action,
            "notes": self.notes,
            "eventId": event_id,
            "updatedAt": at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_a_valid_decision() {
        let (decision, raw) = AgentDecision::parse("{}").unwrap();
        assert_eq!(decision, AgentDecision::default());
        assert_eq!(raw, json!({}));
    }

    #[test]
    fn test_parses_proposed_tool_calls() {
        let (decision, _) = AgentDecision::parse(
            r#"{"score": 80, "stage": "qualified", "proposedToolCalls": [
                {"tool": "crm.lead.create", "payload": {"email": "a@b.com"}},
                {"tool": "notify.emit"}
            ], "confidence": "high"}"#,
        )
        .unwrap();

        assert_eq!(decision.score, Some(80.0));
        assert_eq!(decision.stage.as_deref(), Some("qualified"));
        assert_eq!(decision.proposed_tool_calls.len(), 2);
        assert_eq!(decision.proposed_tool_calls[0].tool, "crm.lead.create");
        assert!(decision.proposed_tool_calls[1].payload.is_null());
        assert_eq!(decision.extra.get("confidence"), Some(&json!("high")));
    }

    #[test]
    fn test_accepts_snake_case_and_null_tool_calls() {
        let (decision, _) =
            AgentDecision::parse(r#"{"proposed_tool_calls": [{"tool": "notify.emit"}]}"#).unwrap();
        assert_eq!(decision.proposed_tool_calls.len(), 1);

        let (decision, _) = AgentDecision::parse(r#"{"proposedToolCalls": null}"#).unwrap();
        assert!(decision.proposed_tool_calls.is_empty());
    }

    #[test]
    fn test_rejects_non_object_output() {
        assert!(matches!(
            AgentDecision::parse("I think this lead is great"),
            Err(ModelInvocationError::Parse(_))
        ));
        assert!(matches!(
            AgentDecision::parse("[1, 2]"),
            Err(ModelInvocationError::Parse(_))
        ));
    }

    #[test]
    fn test_numeric_string_score_is_accepted() {
        let (decision, _) = AgentDecision::parse(r#"{"score": " 80 "}"#).unwrap();
        assert_eq!(decision.score, Some(80.0));
        assert!(decision.extra.is_empty());
    }

    #[test]
    fn test_mistyped_fields_are_kept_in_extra() {
        let (decision, _) = AgentDecision::parse(
            r#"{"score": "very high", "tags": "warm", "stage": 3, "notes": "ok",
                "proposedToolCalls": {"tool": "notify.emit"}}"#,
        )
        .unwrap();

        assert_eq!(decision.score, None);
        assert_eq!(decision.tags, None);
        assert_eq!(decision.stage, None);
        assert_eq!(decision.notes.as_deref(), Some("ok"));
        assert!(decision.proposed_tool_calls.is_empty());
        assert_eq!(decision.extra.get("score"), Some(&json!("very high")));
        assert_eq!(decision.extra.get("tags"), Some(&json!("warm")));
        assert_eq!(decision.extra.get("stage"), Some(&json!(3)));
        assert!(decision.extra.contains_key("proposedToolCalls"));
    }

    #[test]
    fn test_malformed_tool_call_does_not_drop_siblings() {
        let (decision, _) = AgentDecision::parse(
            r#"{"proposedToolCalls": [
                {"tool": "crm.lead.create", "payload": {"name": "Ada"}},
                {"name": "oops"},
                "notify.emit",
                {"tool": 7}
            ]}"#,
        )
        .unwrap();

        let calls = &decision.proposed_tool_calls;
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], ProposedToolCall::new("crm.lead.create", json!({"name": "Ada"})));
        assert!(calls[1..].iter().all(ProposedToolCall::is_invalid));
    }

    #[test]
    fn test_deserialize_matches_from_value() {
        let raw = json!({"score": "42", "tags": ["a", "b"], "proposedToolCalls": [{}]});
        let decision: AgentDecision = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(decision, AgentDecision::from_value(&raw).unwrap());
        assert_eq!(decision.score, Some(42.0));
        assert_eq!(decision.tags, Some(vec!["a".to_string(), "b".to_string()]));
    }
}
