use serde_json::Value;

use crate::error::AgentError;

/// One entry of an assistant message's `tool_calls` array, decoded.
#[derive(Debug, Clone)]
pub(super) struct RequestedCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl RequestedCall {
    /// Decode a raw tool call. On failure the call id (possibly empty) is
    /// returned alongside the error so the rejection can be observed.
    pub fn decode(raw: &Value) -> Result<Self, (String, AgentError)> {
        let id = raw["id"].as_str().unwrap_or_default().to_string();

        let Some(function) = raw.get("function") else {
            return Err((
                id,
                AgentError::InvalidFunctionCall("Tool call missing function".to_string()),
            ));
        };

        let name = match function["name"].as_str() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err((
                    id,
                    AgentError::InvalidFunctionCall("Tool call missing function name".to_string()),
                ))
            }
        };

        // some providers send an object instead of an encoded string
        let arguments = match &function["arguments"] {
            Value::String(text) if text.trim().is_empty() => Value::Object(Default::default()),
            Value::String(text) => serde_json::from_str(text).map_err(|err| {
                (
                    id.clone(),
                    AgentError::InvalidFunctionCall(format!(
                        "Failed to parse arguments for tool '{}': {}",
                        name, err
                    )),
                )
            })?,
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        Ok(Self { id, name, arguments })
    }
}

/// Name of a raw tool call, without decoding its arguments.
pub(super) fn requested_name(raw: &Value) -> Option<&str> {
    raw["function"]["name"].as_str()
}
