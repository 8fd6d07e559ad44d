// Model Invocation Adapter
//
// Turns (system prompt, event) into a structured decision. Implementations
// only return the model's proposal; executing tool calls is the runner's job.
// No retries happen at this layer.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::decision::AgentDecision;

/// Why a model invocation produced no decision
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelInvocationError {
    /// Network or connection failure
    #[error("model transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout
    #[error("model request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status
    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response envelope was missing the expected content
    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    /// Content was not a usable JSON decision
    #[error("unparsable model output: {0}")]
    Parse(String),
}

/// Tool description offered to the model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What the model reasons over
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub intent: String,
    pub payload: Value,
    pub business_id: String,
    /// Tools the resolved agent may use
    pub tools: Vec<ToolSpec>,
}

impl ModelInput {
    /// User message body sent alongside the system prompt
    pub fn user_content(&self) -> Value {
        json!({
            "intent": self.intent,
            "businessId": self.business_id,
            "payload": self.payload,
            "availableTools": self.tools,
        })
    }
}

/// A parsed model reply
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub decision: AgentDecision,
    pub tokens_used: Option<i64>,
    /// The decision object exactly as the model returned it
    pub raw: Value,
}

impl ModelResponse {
    pub fn from_raw(raw: Value, tokens_used: Option<i64>) -> Result<Self, ModelInvocationError> {
        let decision = AgentDecision::from_value(&raw)?;
        Ok(Self {
            decision,
            tokens_used,
            raw,
        })
    }
}

/// Client for an external reasoning model
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(
        &self,
        system_prompt: &str,
        input: &ModelInput,
    ) -> Result<ModelResponse, ModelInvocationError>;
}
