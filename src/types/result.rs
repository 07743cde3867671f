use super::response::deserialize_structured_response;
use crate::{
    core::steps::AgentStep,
    error::{AgentError, Result as AgentResult},
    schemas::{CompletionSchema, SchemaHandle},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Outcome of one agent run: the answer, the validated payload, and the trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Final answer text
    pub output: String,
    /// Normalized and validated structured payload, when a schema was active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    #[serde(skip)]
    pub schema: Option<SchemaHandle>,
    pub steps: Vec<AgentStep>,
    /// Token usage of the last model call, if the backend reported it
    pub tokens: Option<TokenUsage>,
    pub duration: Duration,
    pub iterations: usize,
}

/// Token usage information from the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl RunResult {
    pub fn new(
        output: String,
        structured: Option<Value>,
        schema: Option<SchemaHandle>,
        steps: Vec<AgentStep>,
        tokens: Option<TokenUsage>,
        duration: Duration,
        iterations: usize,
    ) -> Self {
        Self {
            output,
            structured,
            schema,
            steps,
            tokens,
            duration,
            iterations,
        }
    }

    /// Human-readable replay of the run
    pub fn replay(&self) -> String {
        let mut lines = vec![
            "=== Agent Execution Trace ===".to_string(),
            format!("Duration: {:.2}s", self.duration.as_secs_f64()),
            format!("Iterations: {}", self.iterations),
        ];

        if let Some(tokens) = &self.tokens {
            lines.push(format!(
                "Tokens: {} prompt + {} completion = {} total",
                tokens.prompt_tokens, tokens.completion_tokens, tokens.total_tokens
            ));
        }

        lines.push(String::new());
        lines.push("--- Steps ---".to_string());
        lines.extend(
            self.steps
                .iter()
                .enumerate()
                .map(|(idx, step)| format!("{}. {}", idx + 1, step.describe())),
        );

        lines.push(String::new());
        lines.push("--- Final Output ---".to_string());
        lines.push(self.output.clone());

        lines.join("\n")
    }

    pub fn structured(&self) -> Option<&Value> {
        self.structured.as_ref()
    }

    /// Deserialize the structured payload into the type its schema was generated from.
    pub fn deserialize_structured<T>(&self) -> AgentResult<T>
    where
        T: CompletionSchema,
    {
        let payload = self.structured.as_ref().ok_or_else(|| {
            AgentError::Validation("No structured response available on this run".to_string())
        })?;

        let schema = self.schema.as_ref().ok_or_else(|| {
            AgentError::Validation(
                "Missing completion schema metadata for structured response".to_string(),
            )
        })?;

        deserialize_structured_response::<T>(payload, schema)
    }

    /// Number of tool calls executed
    pub fn action_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, AgentStep::Action { .. }))
            .count()
    }

    /// Tool calls made with one tool, in order
    pub fn actions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.steps.iter().filter_map(move |step| match step {
            AgentStep::Action {
                tool_name,
                arguments,
                ..
            } if tool_name == name => Some(arguments),
            _ => None,
        })
    }

    /// All error observations
    pub fn errors(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                AgentStep::Observation {
                    result, is_error, ..
                } if *is_error => Some(result.as_str()),
                _ => None,
            })
            .collect()
    }
}
