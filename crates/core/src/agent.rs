// Agent definitions
//
// Agent configuration is owned externally; the runner only reads it.
// The orchestrator is an ordinary agent record that additionally carries an
// intent -> slug routing table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Slug reported when no agent definition could be resolved
pub const BUILTIN_AGENT_SLUG: &str = "builtin";

/// Prompt used when no agent definition could be resolved
pub const BUILTIN_SYSTEM_PROMPT: &str = "You are a cautious assistant. Analyze the event and \
respond with a JSON object containing optional fields score, tags, stage, outcome, notes and \
action. Do not propose any tool calls.";

/// Agent configuration record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AgentDefinition {
    pub slug: String,
    pub name: String,
    pub system_prompt: String,
    /// Tool identifiers this agent may execute
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    pub is_active: bool,
    /// Intent -> agent slug (orchestrator only)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routing: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentDefinition {
    pub fn new(
        slug: impl Into<String>,
        system_prompt: impl Into<String>,
        allowed_tools: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let slug = slug.into();
        let now = Utc::now();
        Self {
            name: slug.clone(),
            slug,
            system_prompt: system_prompt.into(),
            allowed_tools: allowed_tools.into_iter().map(Into::into).collect(),
            is_active: true,
            routing: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_route(mut self, intent: impl Into<String>, slug: impl Into<String>) -> Self {
        self.routing.insert(intent.into(), slug.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }

    /// Look up the routing table for an intent
    pub fn route(&self, intent: &str) -> Option<&str> {
        self.routing.get(intent).map(String::as_str)
    }
}

/// How the handling agent was chosen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// The event addressed an agent directly
    Targeted,
    /// The orchestrator's routing table matched the intent
    Routed,
    /// No route matched; the default agent handled it
    Default,
    /// The chosen agent was missing or inactive; the default agent handled it
    Fallback,
    /// Nothing resolved; the built-in prompt with no tools handled it
    Builtin,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Targeted => "targeted",
            Resolution::Routed => "routed",
            Resolution::Default => "default",
            Resolution::Fallback => "fallback",
            Resolution::Builtin => "builtin",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agent a run executes under
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAgent {
    pub slug: String,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub resolution: Resolution,
}

impl ResolvedAgent {
    pub fn from_definition(definition: AgentDefinition, resolution: Resolution) -> Self {
        Self {
            slug: definition.slug,
            system_prompt: definition.system_prompt,
            allowed_tools: definition.allowed_tools,
            resolution,
        }
    }

    pub fn builtin() -> Self {
        Self {
            slug: BUILTIN_AGENT_SLUG.to_string(),
            system_prompt: BUILTIN_SYSTEM_PROMPT.to_string(),
            allowed_tools: Vec::new(),
            resolution: Resolution::Builtin,
        }
    }

    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }
}
