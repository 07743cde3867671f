pub mod engine;

pub use engine::{reconcile, ItineraryPlanner, OrchestrationEngine, PlanOutcome};
