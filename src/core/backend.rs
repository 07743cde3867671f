use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A chat-completion endpoint speaking the OpenAI wire format.
///
/// Every component that talks to a model receives one of these explicitly;
/// there is no process-wide client.
#[async_trait]
pub trait ChatBackend: Send + Sync + std::fmt::Debug {
    /// Send one request body and return the raw JSON response.
    async fn chat_completion(&self, body: &Value, timeout: Duration) -> Result<Value>;
}

/// Shared handle to a chat backend.
pub type LlmHandle = Arc<dyn ChatBackend>;
