use serde::{Deserialize, Serialize};
use serde_json::Value;

const DESCRIBE_LIMIT: usize = 240;

/// One entry in an agent's reasoning trace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStep {
    /// Instruction the agent was started with
    Task { content: String },
    /// Tool call requested by the model
    Action {
        tool_name: String,
        tool_call_id: String,
        arguments: Value,
    },
    /// Tool result (or runtime error) fed back to the model
    Observation {
        tool_call_id: String,
        result: String,
        is_error: bool,
    },
    /// Terminal answer, with the validated payload when a schema is active
    FinalAnswer {
        answer: String,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        structured: Option<Value>,
    },
}

impl AgentStep {
    /// Convert step to OpenAI message format
    pub fn to_message(&self) -> Value {
        match self {
            AgentStep::Task { content } => serde_json::json!({
                "role": "user",
                "content": content
            }),
            AgentStep::Action {
                tool_name,
                tool_call_id,
                arguments,
            } => serde_json::json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": tool_call_id,
                    "type": "function",
                    "function": {
                        "name": tool_name,
                        "arguments": arguments.to_string()
                    }
                }]
            }),
            AgentStep::Observation {
                tool_call_id,
                result,
                ..
            } => serde_json::json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": result
            }),
            AgentStep::FinalAnswer { answer, .. } => serde_json::json!({
                "role": "assistant",
                "content": answer
            }),
        }
    }

    /// One-line summary for logs and traces
    pub fn describe(&self) -> String {
        match self {
            AgentStep::Task { content } => format!("🧭 Task: {}", clip(content)),
            AgentStep::Action {
                tool_name,
                arguments,
                ..
            } => format!("🔧 Action: {}({})", tool_name, clip(&arguments.to_string())),
            AgentStep::Observation {
                result, is_error, ..
            } => {
                if *is_error {
                    format!("❌ Error: {}", clip(result))
                } else {
                    format!("👁 Observation: {}", clip(result))
                }
            }
            AgentStep::FinalAnswer { answer, .. } => format!("✅ Final Answer: {}", clip(answer)),
        }
    }
}

fn clip(text: &str) -> String {
    match text.char_indices().nth(DESCRIBE_LIMIT) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
