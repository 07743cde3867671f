use thiserror::Error;

/// Main error type for the itinerary worker
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input validation error: {0}")]
    InvalidRequest(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schema validation error: {message}")]
    SchemaValidation {
        message: String,
        details: Option<String>,
    },

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid function call: {0}")]
    InvalidFunctionCall(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Maximum iterations exceeded: {0}")]
    MaxIterations(usize),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::Validation(_)
                | AgentError::RateLimit { .. }
                | AgentError::Timeout(_)
                | AgentError::Transport(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentError::Config(_) => "CONFIG_ERROR",
            AgentError::InvalidRequest(_) => "INPUT_VALIDATION_ERROR",
            AgentError::Decode(_) => "DECODE_ERROR",
            AgentError::Serialization(_) => "SERIALIZATION_ERROR",
            AgentError::Validation(_) => "VALIDATION_ERROR",
            AgentError::SchemaValidation { .. } => "SCHEMA_VALIDATION_ERROR",
            AgentError::ToolExecution(_) => "TOOL_EXECUTION_ERROR",
            AgentError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            AgentError::InvalidFunctionCall(_) => "INVALID_FUNCTION_CALL",
            AgentError::Timeout(_) => "TIMEOUT_ERROR",
            AgentError::MaxIterations(_) => "MAX_ITERATIONS_EXCEEDED",
            AgentError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            AgentError::Transport(_) => "TRANSPORT_ERROR",
            AgentError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Diagnostic text attached to outbound error results, when there is any
    pub fn details(&self) -> Option<String> {
        match self {
            AgentError::SchemaValidation { details, .. } => details.clone(),
            AgentError::MaxIterations(limit) => Some(format!(
                "The coordinator did not emit a structured itinerary within {} iterations",
                limit
            )),
            _ => None,
        }
    }

    /// Convert to a structured error payload for tool observations
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        })
    }

    /// Convert to the outbound job result shape `{"error": ..., "details": ...}`
    pub fn to_job_result(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({ "error": self.to_string() });
        if let Some(details) = self.details() {
            payload["details"] = serde_json::Value::String(details);
        }
        payload
    }
}
