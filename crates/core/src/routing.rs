// Agent resolution
//
// Order: explicit target -> orchestrator route -> default slug. The chosen
// slug must be active, else the default agent is used. If nothing resolves
// (or the agent store fails) the built-in prompt with no tools is used, so
// every claimed event can still be finalized.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::agent::{Resolution, ResolvedAgent};
use crate::event::Event;
use crate::traits::AgentStore;

#[derive(Clone)]
pub struct AgentResolver {
    agents: Arc<dyn AgentStore>,
    default_slug: String,
    orchestrator_slug: String,
}

impl AgentResolver {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        default_slug: impl Into<String>,
        orchestrator_slug: impl Into<String>,
    ) -> Self {
        Self {
            agents,
            default_slug: default_slug.into(),
            orchestrator_slug: orchestrator_slug.into(),
        }
    }

    /// Resolve the agent for an event. Never fails.
    pub async fn resolve(&self, event: &Event) -> ResolvedAgent {
        let (target, resolution) = match event.target_agent.as_deref() {
            Some(slug) => (slug.to_string(), Resolution::Targeted),
            None => match self.agents.get_active(&self.orchestrator_slug).await {
                Ok(orchestrator) => match orchestrator
                    .as_ref()
                    .and_then(|o| o.route(&event.intent))
                {
                    Some(slug) => (slug.to_string(), Resolution::Routed),
                    None => (self.default_slug.clone(), Resolution::Default),
                },
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "Agent store unavailable, using built-in agent");
                    return ResolvedAgent::builtin();
                }
            },
        };

        match self.agents.get_active(&target).await {
            Ok(Some(definition)) => {
                debug!(event_id = %event.id, agent = %definition.slug, resolution = %resolution, "Resolved agent");
                return ResolvedAgent::from_definition(definition, resolution);
            }
            Ok(None) if target != self.default_slug => {
                warn!(event_id = %event.id, agent = %target, "Agent missing or inactive, falling back to default");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Agent store unavailable, using built-in agent");
                return ResolvedAgent::builtin();
            }
        }

        if target != self.default_slug {
            match self.agents.get_active(&self.default_slug).await {
                Ok(Some(definition)) => {
                    return ResolvedAgent::from_definition(definition, Resolution::Fallback)
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "Agent store unavailable, using built-in agent");
                    return ResolvedAgent::builtin();
                }
            }
        }

        warn!(event_id = %event.id, agent = %self.default_slug, "Default agent unavailable, using built-in agent");
        ResolvedAgent::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDefinition, BUILTIN_AGENT_SLUG};
    use crate::event::NewEvent;
    use crate::memory::{InMemoryAgentStore, InMemoryEventStore};
    use crate::traits::EventStore;
    use serde_json::json;

    async fn event(input: NewEvent) -> Event {
        InMemoryEventStore::new().enqueue(input).await.unwrap()
    }

    fn setup() -> (Arc<InMemoryAgentStore>, AgentResolver) {
        let agents = Arc::new(InMemoryAgentStore::new());
        agents.insert(
            AgentDefinition::new("orchestrator", "route things", Vec::<String>::new())
                .with_route("booking.request", "scheduler")
                .with_route("support.ticket", "support"),
        );
        agents.insert(AgentDefinition::new(
            "lead_qualifier",
            "qualify leads",
            ["crm.lead.create"],
        ));
        agents.insert(AgentDefinition::new(
            "scheduler",
            "book meetings",
            ["calendar.slot.book"],
        ));
        agents.insert(AgentDefinition::new("support", "help", ["notify.emit"]).inactive());
        let resolver = AgentResolver::new(agents.clone(), "lead_qualifier", "orchestrator");
        (agents, resolver)
    }

    #[tokio::test]
    async fn test_routed_intent() {
        let (_, resolver) = setup();
        let agent = resolver
            .resolve(&event(NewEvent::new("booking.request", "T1", json!({}))).await)
            .await;
        assert_eq!(agent.slug, "scheduler");
        assert_eq!(agent.resolution, Resolution::Routed);
        assert!(agent.allows("calendar.slot.book"));
    }

    #[tokio::test]
    async fn test_unrouted_intent_uses_default_agent() {
        let (_, resolver) = setup();
        let agent = resolver
            .resolve(&event(NewEvent::new("contact.submit", "T1", json!({}))).await)
            .await;
        assert_eq!(agent.slug, "lead_qualifier");
        assert_eq!(agent.resolution, Resolution::Default);
    }

    #[tokio::test]
    async fn test_inactive_route_target_falls_back() {
        let (_, resolver) = setup();
        let agent = resolver
            .resolve(&event(NewEvent::new("support.ticket", "T1", json!({}))).await)
            .await;
        assert_eq!(agent.slug, "lead_qualifier");
        assert_eq!(agent.resolution, Resolution::Fallback);
    }

    #[tokio::test]
    async fn test_explicit_target_wins_over_routing() {
        let (_, resolver) = setup();
        let agent = resolver
            .resolve(
                &event(
                    NewEvent::new("booking.request", "T1", json!({}))
                        .with_target_agent("lead_qualifier"),
                )
                .await,
            )
            .await;
        assert_eq!(agent.slug, "lead_qualifier");
        assert_eq!(agent.resolution, Resolution::Targeted);
    }

    #[tokio::test]
    async fn test_missing_default_uses_builtin() {
        let agents = Arc::new(InMemoryAgentStore::new());
        let resolver = AgentResolver::new(agents, "lead_qualifier", "orchestrator");
        let agent = resolver
            .resolve(&event(NewEvent::new("contact.submit", "T1", json!({}))).await)
            .await;
        assert_eq!(agent.slug, BUILTIN_AGENT_SLUG);
        assert!(agent.allowed_tools.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_uses_builtin() {
        let (agents, resolver) = setup();
        agents.set_unavailable(true);
        let agent = resolver
            .resolve(&event(NewEvent::new("booking.request", "T1", json!({}))).await)
            .await;
        assert_eq!(agent.resolution, Resolution::Builtin);
    }
}
