//! Queue consumer: one inbound job, one outbound result, then ack

pub mod broker;
pub mod consumer;
pub mod health;

pub use broker::{Delivery, Envelope, JsonLinesBroker, MemoryBroker, MessageBroker, StdioBroker};
pub use consumer::Consumer;
pub use health::{HealthMonitor, HealthReport};
