use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, StatusCode};
use serde_json::{json, Value};
use tracing::warn;

use crate::{
    config::DEFAULT_BASE_URL,
    core::backend::ChatBackend,
    error::{AgentError, Result},
};

const MAX_RETRIES: usize = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// OpenAI-compatible chat client (OpenRouter by default).
#[derive(Clone, Debug)]
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// What to do with one HTTP exchange.
enum Exchange {
    Done(Value),
    Retry(Duration),
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn exchange(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
        attempt: usize,
        backoff: Duration,
    ) -> Result<Exchange> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "itinerary-swarm")
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AgentError::Timeout(format!("chat request exceeded {:?}", timeout))
                } else {
                    AgentError::Transport(format!("chat request failed: {err}"))
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|err| AgentError::Transport(format!("failed to read chat response: {err}")))?;

        let retries_left = attempt < MAX_RETRIES;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let delay = retry_after(&headers).unwrap_or(backoff);
            if retries_left {
                warn!(target: "itinerary::llm", attempt, delay_secs = delay.as_secs_f64(), "rate limited");
                return Ok(Exchange::Retry(delay));
            }
            return Err(AgentError::RateLimit {
                retry_after: delay.as_secs().max(1),
            });
        }

        if status.is_server_error() && retries_left {
            warn!(target: "itinerary::llm", attempt, %status, "server error, retrying");
            return Ok(Exchange::Retry(backoff));
        }

        let payload: Value = serde_json::from_str(&text).map_err(|err| {
            AgentError::Unknown(format!("HTTP {status}: response is not JSON ({err}): {text}"))
        })?;

        match payload.get("error") {
            Some(error) => {
                let message = error["message"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                Err(AgentError::Unknown(if status.is_success() {
                    format!("API error: {message}")
                } else {
                    format!("HTTP {status} error: {message}")
                }))
            }
            None if !status.is_success() => {
                Err(AgentError::Unknown(format!("HTTP {status} error: {text}")))
            }
            None => Ok(Exchange::Done(payload)),
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl ChatBackend for OpenAIClient {
    async fn chat_completion(&self, body: &Value, timeout: Duration) -> Result<Value> {
        let url = build_chat_url(&self.base_url);
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            match self.exchange(&url, body, timeout, attempt, backoff).await? {
                Exchange::Done(payload) => return Ok(payload),
                Exchange::Retry(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    backoff *= 2;
                }
            }
        }
    }
}

fn build_chat_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

/// Body of a `/chat/completions` call.
#[derive(Clone, Debug)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    tools: Vec<Value>,
    tool_choice: Option<Value>,
    max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: Value) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn into_value(self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
        });

        if !self.tools.is_empty() {
            body["tools"] = Value::Array(self.tools);
        }

        if let Some(tool_choice) = self.tool_choice {
            body["tool_choice"] = tool_choice;
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_is_appended_once() {
        assert_eq!(
            build_chat_url("https://openrouter.ai/api/v1/"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            build_chat_url("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn request_body_omits_empty_tools() {
        let body = ChatCompletionRequest::new("model-x", vec![json!({"role": "user", "content": "hi"})])
            .with_max_tokens(Some(64))
            .into_value();
        assert_eq!(body["model"], "model-x");
        assert_eq!(body["max_tokens"], 64);
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn server_error_body_becomes_unknown_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad model"}}"#)
            .create_async()
            .await;

        let client = OpenAIClient::new("key").with_base_url(server.url());
        let err = client
            .chat_completion(&json!({"model": "m"}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad model"));
    }

    #[tokio::test]
    async fn rate_limit_honours_retry_after_then_gives_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "0")
            .with_body("{}")
            .expect(MAX_RETRIES + 1)
            .create_async()
            .await;

        let client = OpenAIClient::new("key").with_base_url(server.url());
        let err = client
            .chat_completion(&json!({"model": "m"}), Duration::from_secs(5))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AgentError::RateLimit { retry_after: 1 }));
        assert!(err.is_retryable());
    }
}
