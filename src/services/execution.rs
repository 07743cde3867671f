use super::response_handler::{
    handle_final_answer, handle_structured_response, FinalAnswerContext, HandlerOutcome,
    RunContext, StructuredResponseContext,
};
use crate::{
    core::{agent::Agent, memory::AgentMemory, steps::AgentStep},
    error::{AgentError, Result},
    schemas::validation::{
        final_answer_tool_definition, inject_schema_instructions,
        structured_response_tool_definition, structured_response_tool_name,
    },
    services::{
        openai_client::ChatCompletionRequest,
        tool_call_utils::{requested_name, RequestedCall},
    },
    types::result::{RunResult, TokenUsage},
};
use serde_json::{json, Value};
use std::time::Instant;
use tokio::time::timeout;
use tracing::debug;

fn reject(memory: &mut AgentMemory, tool_call_id: &str, error: AgentError) {
    memory.add_step(AgentStep::Observation {
        tool_call_id: tool_call_id.to_string(),
        result: error.to_error_payload().to_string(),
        is_error: true,
    });
}

fn parse_token_usage(response: &Value) -> Option<TokenUsage> {
    let usage = response.get("usage")?;
    Some(TokenUsage {
        prompt_tokens: usage.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: usage.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: usage.get("total_tokens")?.as_u64()? as u32,
    })
}

fn assistant_message(response: &Value) -> Result<Value> {
    let choices = response
        .get("choices")
        .and_then(|value| value.as_array())
        .ok_or_else(|| {
            AgentError::Unknown("Missing 'choices' array in completion response".to_string())
        })?;

    let first_choice = choices.first().ok_or_else(|| {
        AgentError::Unknown("Completion response contained no choices".to_string())
    })?;

    first_choice.get("message").cloned().ok_or_else(|| {
        AgentError::Unknown("Completion response missing assistant message".to_string())
    })
}

impl Agent {
    /// Run the tool-calling loop and return the full trace.
    ///
    /// Each iteration sends the accumulated memory to the backend, executes
    /// any requested tools, and stops once a terminal tool (`final_answer`
    /// or `structured_response`) produces a result.
    pub async fn run_with_steps(&self, prompt: &str) -> Result<RunResult> {
        let start_time = Instant::now();
        let mut memory = AgentMemory::new(Some(self.system_prompt().to_string()));

        memory.add_step(AgentStep::Task {
            content: prompt.to_string(),
        });

        let mut iteration = 0;
        let mut has_final_answer = false;
        let mut final_answer_value: Option<String> = None;

        while iteration < self.max_iterations() {
            iteration += 1;
            debug!(target: "itinerary::agent", agent = self.name(), iteration);

            let mut messages = memory.as_messages();
            if let Some(schema) = self.completion_schema() {
                inject_schema_instructions(&mut messages, schema);
            }

            let mut tools = self.function_factory().get_openai_tools();
            if let Some(schema) = self.completion_schema() {
                tools.push(structured_response_tool_definition(schema));
            } else {
                tools.push(final_answer_tool_definition());
            }

            let request_body = ChatCompletionRequest::new(self.model().to_owned(), messages)
                .with_max_tokens(self.max_tokens())
                .with_tools(tools)
                .with_tool_choice(json!("auto"))
                .into_value();

            let response = timeout(self.timeout(), self.make_raw_request(&request_body))
                .await
                .map_err(|_| {
                    AgentError::Timeout(format!("{}: model call timed out", self.name()))
                })??;

            let assistant_message = assistant_message(&response)?;
            let token_usage = parse_token_usage(&response);

            let Some(tool_calls) = assistant_message
                .get("tool_calls")
                .and_then(|calls| calls.as_array())
                .filter(|calls| !calls.is_empty())
            else {
                let answer = assistant_message
                    .get("content")
                    .and_then(|value| value.as_str())
                    .unwrap_or("")
                    .trim()
                    .to_string();

                let tool_name = if self.completion_schema().is_some() {
                    structured_response_tool_name()
                } else {
                    "final_answer"
                };

                let message = if answer.is_empty() {
                    format!(
                        "Assistant must call the `{}` tool to conclude the task, but returned no content.",
                        tool_name
                    )
                } else {
                    format!(
                        "Assistant must call the `{}` tool to conclude the task instead of responding directly: {}",
                        tool_name, answer
                    )
                };

                memory.add_step(AgentStep::Observation {
                    tool_call_id: tool_name.to_string(),
                    result: message,
                    is_error: true,
                });
                continue;
            };

            let turn_has_final_answer = tool_calls
                .iter()
                .any(|tool_call| requested_name(tool_call) == Some("final_answer"));

            if turn_has_final_answer && tool_calls.len() > 1 {
                reject(
                    &mut memory,
                    "final_answer",
                    AgentError::InvalidFunctionCall(
                        "`final_answer` must be the only tool call in a single turn".to_string(),
                    ),
                );
                continue;
            }

            for tool_call in tool_calls {
                let RequestedCall {
                    id,
                    name: function_name,
                    arguments: arguments_json,
                } = match RequestedCall::decode(tool_call) {
                    Ok(call) => call,
                    Err((id, error)) => {
                        reject(&mut memory, &id, error);
                        continue;
                    }
                };
                let tool_call_id = id.as_str();

                let run = RunContext {
                    token_usage: token_usage.clone(),
                    elapsed: start_time.elapsed(),
                    iteration,
                };

                if function_name == "final_answer" {
                    let ctx = FinalAnswerContext {
                        tool_call_id,
                        arguments_json,
                        completion_schema: self.completion_schema(),
                        has_final_answer: &mut has_final_answer,
                        final_answer_value: &mut final_answer_value,
                        run,
                    };

                    match handle_final_answer(ctx, &mut memory)? {
                        HandlerOutcome::Continue => continue,
                        HandlerOutcome::ReturnResult(result) => return Ok(result),
                    }
                }

                if function_name == structured_response_tool_name() {
                    let Some(schema) = self.completion_schema() else {
                        reject(
                            &mut memory,
                            tool_call_id,
                            AgentError::InvalidFunctionCall(
                                "No completion schema is active for structured response"
                                    .to_string(),
                            ),
                        );
                        continue;
                    };

                    let ctx = StructuredResponseContext {
                        tool_call_id,
                        arguments_json,
                        schema,
                        policy: self.schema_policy(),
                        final_answer_value: final_answer_value.clone(),
                        run,
                    };

                    match handle_structured_response(ctx, &mut memory)? {
                        HandlerOutcome::Continue => continue,
                        HandlerOutcome::ReturnResult(result) => return Ok(result),
                    }
                }

                memory.add_step(AgentStep::Action {
                    tool_name: function_name.clone(),
                    tool_call_id: tool_call_id.to_string(),
                    arguments: arguments_json.clone(),
                });

                match self
                    .function_factory()
                    .execute_function(&function_name, arguments_json)
                    .await
                {
                    Ok(result) => {
                        let result = match result {
                            Value::String(text) => text,
                            other => other.to_string(),
                        };
                        memory.add_step(AgentStep::Observation {
                            tool_call_id: tool_call_id.to_string(),
                            result,
                            is_error: false,
                        });
                    }
                    Err(error) => reject(&mut memory, tool_call_id, error),
                }
            }
        }

        Err(AgentError::MaxIterations(self.max_iterations()))
    }
}
