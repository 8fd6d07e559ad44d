// Runner configuration
//
// RunnerConfig is plain data: build it directly in tests, or from the
// environment in binaries.

use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_AGENT_SLUG: &str = "lead_qualifier";
pub const DEFAULT_ORCHESTRATOR_SLUG: &str = "orchestrator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Identity written to `locked_by` on claim
    pub runner_id: String,
    /// Processing events older than this are reclaimable
    pub lease_timeout: Duration,
    /// Agent handling unrouted events and missing targets
    pub default_agent_slug: String,
    /// Agent whose routing table maps intents to slugs
    pub orchestrator_slug: String,
}

impl RunnerConfig {
    /// Create configuration from environment variables
    ///
    /// - `RUNNER_ID` (default: `runner-<uuid>`)
    /// - `LEASE_TIMEOUT_SECS` (default: 300)
    /// - `DEFAULT_AGENT_SLUG` (default: `lead_qualifier`)
    /// - `ORCHESTRATOR_SLUG` (default: `orchestrator`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            runner_id: std::env::var("RUNNER_ID").unwrap_or(defaults.runner_id),
            lease_timeout: std::env::var("LEASE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.lease_timeout),
            default_agent_slug: std::env::var("DEFAULT_AGENT_SLUG")
                .unwrap_or(defaults.default_agent_slug),
            orchestrator_slug: std::env::var("ORCHESTRATOR_SLUG")
                .unwrap_or(defaults.orchestrator_slug),
        }
    }

    pub fn with_runner_id(mut self, runner_id: impl Into<String>) -> Self {
        self.runner_id = runner_id.into();
        self
    }

    pub fn with_lease_timeout(mut self, lease_timeout: Duration) -> Self {
        self.lease_timeout = lease_timeout;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runner_id: format!("runner-{}", Uuid::new_v4()),
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            default_agent_slug: DEFAULT_AGENT_SLUG.to_string(),
            orchestrator_slug: DEFAULT_ORCHESTRATOR_SLUG.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert!(config.runner_id.starts_with("runner-"));
        assert_eq!(config.lease_timeout, Duration::from_secs(300));
        assert_eq!(config.default_agent_slug, "lead_qualifier");
        assert_eq!(config.orchestrator_slug, "orchestrator");
    }
}
