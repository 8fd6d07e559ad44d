// OpenAI-compatible ModelClient
//
// One non-streaming chat completion per invocation. Failures map onto
// ModelInvocationError kinds; nothing is retried here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use switchyard_core::{
    AgentDecision, ModelClient, ModelInput, ModelInvocationError, ModelResponse,
};

use crate::types::{ChatMessage, ChatRequest, ChatResponse, ResponseFormat};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Base URL without the `/chat/completions` suffix
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            temperature: None,
        }
    }

    /// Create configuration from environment variables
    ///
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_BASE_URL` (default: `https://api.openai.com/v1`)
    /// - `MODEL_NAME` (default: `gpt-4o-mini`)
    /// - `MODEL_TIMEOUT_SECS` (default: 60)
    /// - `MODEL_TEMPERATURE` (default: unset)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set")?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("MODEL_NAME") {
            config.model = model;
        }
        if let Some(secs) = std::env::var("MODEL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }
        config.temperature = std::env::var("MODEL_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok());
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Model client for OpenAI and compatible chat completion endpoints
///
/// ```ignore
/// use switchyard_openai::{OpenAiConfig, OpenAiModelClient};
///
/// let client = OpenAiModelClient::new(OpenAiConfig::from_env()?)?;
/// // or against a compatible endpoint
/// let client = OpenAiModelClient::new(
///     OpenAiConfig::new("key").with_base_url("http://localhost:8080/v1"),
/// )?;
/// ```
#[derive(Clone)]
pub struct OpenAiModelClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiModelClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, system_prompt: &str, input: &ModelInput) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(input.user_content().to_string()),
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat::json_object(),
        }
    }
}

fn transport_error(err: reqwest::Error) -> ModelInvocationError {
    if err.is_timeout() {
        ModelInvocationError::Timeout(err.to_string())
    } else {
        ModelInvocationError::Transport(err.to_string())
    }
}

#[async_trait]
impl ModelClient for OpenAiModelClient {
    #[instrument(skip(self, system_prompt, input), fields(model = %self.config.model, intent = %input.intent))]
    async fn invoke(
        &self,
        system_prompt: &str,
        input: &ModelInput,
    ) -> std::result::Result<ModelResponse, ModelInvocationError> {
        let request = self.build_request(system_prompt, input);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Model request failed");
            return Err(ModelInvocationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ModelInvocationError::InvalidResponse(format!("unexpected response body: {e}"))
        })?;

        let content = parsed.first_content().ok_or_else(|| {
            ModelInvocationError::InvalidResponse("response has no message content".to_string())
        })?;

        let (decision, raw) = AgentDecision::parse(content)?;
        let tokens_used = parsed.total_tokens();
        debug!(
            tokens_used = ?tokens_used,
            proposed_tool_calls = decision.proposed_tool_calls.len(),
            "Model decision received"
        );

        Ok(ModelResponse {
            decision,
            tokens_used,
            raw,
        })
    }
}

impl std::fmt::Debug for OpenAiModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiModelClient")
            .field("config", &self.config)
            .finish()
    }
}
