use crate::{
    core::backend::LlmHandle,
    error::Result,
    schemas::{CompletionSchema, SchemaHandle},
    tools::FunctionFactory,
};
use serde_json::Value;
use std::time::Duration;

pub(crate) const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. Use tools when necessary to provide accurate information. Be concise and helpful. When you are ready to give the final response, you MUST call the `final_answer` tool with an `answer` string instead of replying directly.";

pub const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";

/// What the run loop does when a structured payload fails normalization or
/// schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Report the failure back to the model and let it try again.
    #[default]
    Feedback,
    /// End the run with [`crate::AgentError::SchemaValidation`].
    Terminal,
}

/// Main agent
#[derive(Debug)]
pub struct Agent {
    name: String,
    llm: LlmHandle,
    function_factory: FunctionFactory,
    system_prompt: String,
    model: String,
    max_iterations: usize,
    max_tokens: Option<u32>,
    timeout: Duration,
    completion_schema: Option<SchemaHandle>,
    schema_policy: SchemaPolicy,
}

impl Agent {
    pub fn new(llm: LlmHandle, function_factory: FunctionFactory) -> Self {
        Self {
            name: "agent".to_string(),
            llm,
            function_factory,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_iterations: 10,
            max_tokens: Some(1000),
            timeout: Duration::from_secs(120),
            completion_schema: None,
            schema_policy: SchemaPolicy::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_completion_schema<T: CompletionSchema>(mut self) -> Self {
        self.completion_schema = Some(T::schema().clone());
        self
    }

    pub fn with_schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub(crate) fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub(crate) fn completion_schema(&self) -> Option<&SchemaHandle> {
        self.completion_schema.as_ref()
    }

    pub(crate) fn schema_policy(&self) -> SchemaPolicy {
        self.schema_policy
    }

    pub fn function_factory(&self) -> &FunctionFactory {
        &self.function_factory
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a task and return only the final answer text.
    pub async fn run(&self, prompt: &str) -> Result<String> {
        self.run_with_steps(prompt).await.map(|result| result.output)
    }

    pub(crate) async fn make_raw_request(&self, request_body: &Value) -> Result<Value> {
        self.llm.chat_completion(request_body, self.timeout).await
    }
}
