use crate::{
    core::{agent::SchemaPolicy, memory::AgentMemory, steps::AgentStep},
    error::AgentError,
    schemas::{
        validation::{
            validate_structured_payload, FinalAnswerArguments, StructuredResponseArguments,
        },
        SchemaHandle,
    },
    types::result::{RunResult, TokenUsage},
};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Handler outcome indicating what the execution loop should do next
#[derive(Debug)]
pub(super) enum HandlerOutcome {
    /// Continue with the next iteration
    Continue,
    /// Return a complete RunResult
    ReturnResult(RunResult),
}

/// Run bookkeeping shared by both terminal tool handlers
pub(super) struct RunContext {
    pub token_usage: Option<TokenUsage>,
    pub elapsed: Duration,
    pub iteration: usize,
}

/// Context needed for final_answer handler
pub(super) struct FinalAnswerContext<'a> {
    pub tool_call_id: &'a str,
    pub arguments_json: Value,
    pub completion_schema: Option<&'a SchemaHandle>,
    pub has_final_answer: &'a mut bool,
    pub final_answer_value: &'a mut Option<String>,
    pub run: RunContext,
}

fn report_error(memory: &mut AgentMemory, tool_call_id: &str, error: AgentError) {
    memory.add_step(AgentStep::Observation {
        tool_call_id: tool_call_id.to_string(),
        result: error.to_error_payload().to_string(),
        is_error: true,
    });
}

/// Handle a `final_answer` tool call
pub(super) fn handle_final_answer(
    ctx: FinalAnswerContext<'_>,
    memory: &mut AgentMemory,
) -> Result<HandlerOutcome, AgentError> {
    if *ctx.has_final_answer {
        report_error(
            memory,
            ctx.tool_call_id,
            AgentError::InvalidFunctionCall(
                "`final_answer` was already provided for this run".to_string(),
            ),
        );
        return Ok(HandlerOutcome::Continue);
    }

    let final_args = match serde_json::from_value::<FinalAnswerArguments>(ctx.arguments_json) {
        Ok(args) => args,
        Err(err) => {
            report_error(
                memory,
                ctx.tool_call_id,
                AgentError::InvalidFunctionCall(format!("Invalid final_answer arguments: {}", err)),
            );
            return Ok(HandlerOutcome::Continue);
        }
    };

    let answer = final_args.answer.trim();
    if answer.is_empty() {
        report_error(
            memory,
            ctx.tool_call_id,
            AgentError::InvalidFunctionCall(
                "final_answer requires a non-empty `answer` field".to_string(),
            ),
        );
        return Ok(HandlerOutcome::Continue);
    }

    let answer_string = answer.to_string();
    *ctx.has_final_answer = true;
    *ctx.final_answer_value = Some(answer_string.clone());

    memory.add_step(AgentStep::FinalAnswer {
        answer: answer_string.clone(),
        structured: None,
    });

    if ctx.completion_schema.is_some() {
        memory.add_step(AgentStep::Observation {
            tool_call_id: ctx.tool_call_id.to_string(),
            result: serde_json::json!({ "status": "acknowledged" }).to_string(),
            is_error: false,
        });
        return Ok(HandlerOutcome::Continue);
    }

    Ok(HandlerOutcome::ReturnResult(RunResult::new(
        answer_string,
        None,
        None,
        memory.steps().to_vec(),
        ctx.run.token_usage,
        ctx.run.elapsed,
        ctx.run.iteration,
    )))
}

/// Context needed for structured_response handler
pub(super) struct StructuredResponseContext<'a> {
    pub tool_call_id: &'a str,
    pub arguments_json: Value,
    pub schema: &'a SchemaHandle,
    pub policy: SchemaPolicy,
    pub final_answer_value: Option<String>,
    pub run: RunContext,
}

/// Handle a `structured_response` tool call.
///
/// The payload is normalized through the schema's coercion stage, then
/// validated. Under [`SchemaPolicy::Terminal`] a failure ends the run.
pub(super) fn handle_structured_response(
    ctx: StructuredResponseContext<'_>,
    memory: &mut AgentMemory,
) -> Result<HandlerOutcome, AgentError> {
    let args = match serde_json::from_value::<StructuredResponseArguments>(ctx.arguments_json) {
        Ok(val) => val,
        Err(err) => {
            report_error(
                memory,
                ctx.tool_call_id,
                AgentError::InvalidFunctionCall(format!(
                    "Invalid structured_response arguments: {}",
                    err
                )),
            );
            return Ok(HandlerOutcome::Continue);
        }
    };

    let checked = if args.structured.is_object() {
        ctx.schema
            .normalize(args.structured.clone())
            .and_then(|normalized| {
                validate_structured_payload(ctx.schema, &normalized).map(|_| normalized)
            })
    } else {
        Err(AgentError::SchemaValidation {
            message: format!(
                "`structured_response.structured` must be a JSON object that matches the `{}` schema",
                ctx.schema.schema_name()
            ),
            details: Some(format!("received {}", args.structured)),
        })
    };

    let normalized = match checked {
        Ok(normalized) => normalized,
        Err(err) => {
            debug!(
                target: "itinerary::schema",
                schema = ctx.schema.schema_name(),
                error = %err,
                payload = %args.structured
            );
            if ctx.policy == SchemaPolicy::Terminal {
                return Err(err);
            }
            report_error(memory, ctx.tool_call_id, err);
            return Ok(HandlerOutcome::Continue);
        }
    };

    let answer_string = ctx
        .final_answer_value
        .unwrap_or_else(|| "Task completed with structured response".to_string());

    memory.add_step(AgentStep::FinalAnswer {
        answer: answer_string.clone(),
        structured: Some(normalized.clone()),
    });

    Ok(HandlerOutcome::ReturnResult(RunResult::new(
        answer_string,
        Some(normalized),
        Some(ctx.schema.clone()),
        memory.steps().to_vec(),
        ctx.run.token_usage,
        ctx.run.elapsed,
        ctx.run.iteration,
    )))
}
