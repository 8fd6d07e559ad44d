// Agent Task Runner Core
//
// This crate provides the DB-agnostic core of the runner: claim one queued
// event, resolve the agent, ask the model for a decision, execute the
// authorized tool calls and record the run.
//
// Key design decisions:
// - Uses store traits (EventStore, RunStore, AgentStore, ...) for pluggable backends
// - The model adapter is a trait (ModelClient); HTTP clients live in provider crates
// - Tool identifiers are a closed enum (ToolId); allow-lists are checked per call
// - Registries and stores are passed into the Runner explicitly
// - The Runner processes one event per call; polling belongs to the caller

// Domain types
pub mod agent;
pub mod decision;
pub mod event;
pub mod records;
pub mod run;

pub mod config;
pub mod error;
pub mod model;
pub mod routing;
pub mod runner;
pub mod tools;
pub mod traits;

// In-memory implementations for tests and local runs
pub mod memory;

// Re-exports for convenience
pub use agent::{AgentDefinition, Resolution, ResolvedAgent};
pub use config::RunnerConfig;
pub use decision::{AgentDecision, ProposedToolCall, INVALID_TOOL_CALL};
pub use error::{Result, RunnerError, StoreError, StoreResult};
pub use event::{ClaimedEvent, Event, EventFilter, EventStatus, Lease, NewEvent};
pub use model::{ModelClient, ModelInput, ModelInvocationError, ModelResponse, ToolSpec};
pub use records::{Booking, Lead, Notification, PluginState};
pub use routing::AgentResolver;
pub use run::{Run, RunStatus, ToolCallRecord};
pub use runner::{OutcomeStatus, RunOutcome, Runner, RunnerStores};
pub use tools::{Tool, ToolContext, ToolExecutionResult, ToolId, ToolRegistry, ToolStores};
pub use traits::{
    AgentStore, BookingStore, EventStore, LeadStore, NotificationStore, PluginStateStore,
    RunStore,
};
