//! itinerary-swarm: a queue-driven travel itinerary worker
//!
//! A coordinator agent breaks each travel request down, delegates focused
//! tasks to four specialist agents (attractions, food, transport, lodging),
//! verifies their findings with search and distance tools, and submits one
//! structured [`Itinerary`] that is normalized, schema-validated and
//! reconciled with the request before it is published.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use itinerary_swarm::{ItineraryPlanner, OrchestrationEngine, TravelRequest, WorkerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::from_env()?;
//!     let engine = OrchestrationEngine::from_config(&config);
//!
//!     let request = TravelRequest::from_json_slice(
//!         br#"{"destination": "Kyoto, Japan", "duration_days": 2, "interests": ["temples"]}"#,
//!     )?;
//!     let outcome = engine.plan(&request).await?;
//!     println!("{}", serde_json::to_string_pretty(&outcome.itinerary)?);
//!     Ok(())
//! }
//! ```

extern crate self as itinerary_swarm;

pub mod agents;
pub mod config;
pub mod core;
pub mod error;
pub mod nlu;
pub mod orchestration;
pub mod planning;
pub mod schemas;
pub(crate) mod services;
pub mod tools;
pub mod types;
pub mod worker;

pub use crate::core::{Agent, AgentMemory, AgentStep, ChatBackend, LlmHandle, RunResult, TokenUsage};
pub use agents::{Coordinator, Specialist, SpecialistFinding, SpecialistRole};
pub use config::{PlannerSettings, ProviderConfig, WorkerConfig};
pub use error::{AgentError, Result};
pub use itinerary_swarm_macros::completion_schema;
pub use orchestration::{ItineraryPlanner, OrchestrationEngine, PlanOutcome};
pub use planning::{PlanningTask, TravelRequest};
pub use schemas::{CompletionSchema, SchemaHandle};
pub use services::OpenAIClient;
pub use tools::{Capability, CapabilityProvider, CapabilitySet, FunctionFactory, Tool};
pub use types::{Day, Event, EventType, Itinerary};

pub use crate::core as agent;
pub use schemas as schema;

#[cfg(feature = "cli")]
pub mod cli;
