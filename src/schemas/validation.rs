use crate::{error::AgentError, schemas::SchemaHandle};
use jsonschema::{Draft, JSONSchema};
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_SCHEMA_ERRORS: usize = 3;
const STRUCTURED_RESPONSE_TOOL_NAME: &str = "structured_response";

#[derive(Deserialize)]
pub(crate) struct FinalAnswerArguments {
    pub answer: String,
}

#[derive(Deserialize)]
pub(crate) struct StructuredResponseArguments {
    pub structured: Value,
}

/// Check a (normalized) payload against the handle's JSON schema.
///
/// At most three violations are reported, each prefixed with its instance path.
pub(crate) fn validate_structured_payload(
    schema: &SchemaHandle,
    payload: &Value,
) -> std::result::Result<(), AgentError> {
    let validator = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema.schema_json())
        .map_err(|err| {
            AgentError::Validation(format!(
                "`{}` schema could not be compiled: {}",
                schema.schema_name(),
                err
            ))
        })?;

    let Err(errors) = validator.validate(payload) else {
        return Ok(());
    };

    let violations: Vec<String> = errors
        .take(MAX_SCHEMA_ERRORS + 1)
        .map(|error| {
            let path = error.instance_path.to_string();
            let path = if path.is_empty() { "<root>".to_string() } else { path };
            format!("{}: {}", path, error)
        })
        .collect();

    let mut details = violations
        .iter()
        .take(MAX_SCHEMA_ERRORS)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    if details.is_empty() {
        details = "payload failed schema validation".to_string();
    }
    if violations.len() > MAX_SCHEMA_ERRORS {
        details.push_str("; further violations omitted");
    }

    Err(AgentError::SchemaValidation {
        message: format!("structured payload does not match `{}`", schema.schema_name()),
        details: Some(details),
    })
}

const SCHEMA_REQUIREMENT_MARKER: &str = "Structured response requirement:";

fn function_tool(name: &str, description: String, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

/// Terminal tool for agents without a completion schema (the specialists).
pub(crate) fn final_answer_tool_definition() -> Value {
    function_tool(
        "final_answer",
        "Finish the task by returning your findings as plain text.".to_string(),
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "Findings, or a line starting with NO_QUALIFYING_RESULT"
                }
            },
            "required": ["answer"]
        }),
    )
}

/// Terminal tool carrying the schema's own properties as its `structured` argument.
pub(crate) fn structured_response_tool_definition(schema: &SchemaHandle) -> Value {
    let root = schema.schema_json();
    let mut structured = json!({
        "type": "object",
        "description": format!("The complete {} object.", schema.schema_name()),
        "properties": root.get("properties").cloned().unwrap_or_else(|| json!({})),
    });
    if let Some(required) = root.get("required") {
        structured["required"] = required.clone();
    }
    // nested types ($ref targets) live under `definitions`
    if let Some(definitions) = root.get("definitions") {
        structured["definitions"] = definitions.clone();
    }

    function_tool(
        STRUCTURED_RESPONSE_TOOL_NAME,
        format!(
            "Submit the finished {} as the `structured` argument. Calling this ends the task.",
            schema.schema_name()
        ),
        json!({
            "type": "object",
            "properties": { "structured": structured },
            "required": ["structured"]
        }),
    )
}

/// Append the submission requirement to the leading system message, once.
pub(crate) fn inject_schema_instructions(messages: &mut [Value], schema: &SchemaHandle) {
    let Some(system) = messages
        .first_mut()
        .filter(|message| message["role"] == "system")
    else {
        return;
    };
    let Some(content) = system["content"].as_str() else {
        return;
    };
    if content.contains(SCHEMA_REQUIREMENT_MARKER) {
        return;
    }

    system["content"] = Value::String(format!(
        "{}\n\n{} finish by calling `{}` exactly once with a payload that conforms to the `{}` schema. Replying with plain text does not complete the task.",
        content,
        SCHEMA_REQUIREMENT_MARKER,
        STRUCTURED_RESPONSE_TOOL_NAME,
        schema.schema_name()
    ));
}

pub(crate) fn structured_response_tool_name() -> &'static str {
    STRUCTURED_RESPONSE_TOOL_NAME
}
