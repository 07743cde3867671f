pub mod agent;
pub mod backend;
pub mod memory;
pub mod steps;

pub use crate::types::result::{RunResult, TokenUsage};
pub use agent::{Agent, SchemaPolicy};
pub use backend::{ChatBackend, LlmHandle};
pub use memory::AgentMemory;
pub use steps::AgentStep;
