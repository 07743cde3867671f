//! Turning an inbound travel request into the coordinator's goal statement

pub mod request;
pub mod task;

pub use request::{Budget, BudgetTier, TravelRequest, TripSchedule, MAX_TRIP_DAYS};
pub use task::PlanningTask;
