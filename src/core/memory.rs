use super::steps::AgentStep;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Ordered reasoning steps of one agent run, rendered into chat messages on
/// every iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMemory {
    steps: Vec<AgentStep>,
    system_prompt: Option<String>,
}

impl AgentMemory {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            steps: Vec::new(),
            system_prompt,
        }
    }

    /// Add a step to memory
    pub fn add_step(&mut self, step: AgentStep) {
        info!(target: "itinerary::steps", "{}", step.describe());
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[AgentStep] {
        &self.steps
    }

    /// Convert memory to OpenAI message format.
    ///
    /// Each tool call is rendered as its own assistant turn followed by the
    /// tool reply. Observations with no preceding `Action` (rejected calls,
    /// plain-text replies) become user messages, since a `tool` message must
    /// answer a call.
    pub fn as_messages(&self) -> Vec<Value> {
        let mut messages = Vec::with_capacity(self.steps.len() + 1);

        if let Some(system_prompt) = &self.system_prompt {
            messages.push(serde_json::json!({
                "role": "system",
                "content": system_prompt
            }));
        }

        let mut pending_call: Option<&str> = None;
        for step in &self.steps {
            match step {
                AgentStep::Action { tool_call_id, .. } => pending_call = Some(tool_call_id.as_str()),
                AgentStep::Observation {
                    tool_call_id,
                    result,
                    ..
                } if pending_call != Some(tool_call_id.as_str()) => {
                    messages.push(serde_json::json!({
                        "role": "user",
                        "content": format!("Tool error ({}): {}", tool_call_id, result)
                    }));
                    continue;
                }
                _ => pending_call = None,
            }
            messages.push(step.to_message());
        }
        messages
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of tool calls made with the given tool name.
    pub fn count_actions_named(&self, name: &str) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, AgentStep::Action { tool_name, .. } if tool_name == name))
            .count()
    }
}
