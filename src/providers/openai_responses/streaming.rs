//! Responses API stream reconstruction
//!
//! Events are typed by `type`. Text arrives as `response.output_text.delta`; function
//! calls open with `response.output_item.added` (or `response.tool_call.delta`) and
//! stream their arguments keyed by `output_index`. `response.completed` (or
//! `response.done`) carries the final usage and status.

use serde::Deserialize;
use serde_json::{Value, json};

use super::converter::status_finish_reason;
use crate::error::{LlmError, Warning, classify_vendor_error, taxonomy::RESPONSES_ERRORS};
use crate::providers::openai::converter::parse_usage;
use crate::streaming::{StreamAccumulator, StreamReconstructor};

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponsesStreamEvent {
    #[serde(rename = "response.created", alias = "response.in_progress")]
    Created {
        #[serde(default)]
        response: Value,
    },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        #[serde(default)]
        output_index: usize,
        item: Value,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        #[serde(default)]
        output_index: usize,
        item: Value,
    },
    #[serde(rename = "response.output_text.delta", alias = "response.refusal.delta")]
    OutputTextDelta {
        #[serde(default)]
        delta: Value,
    },
    #[serde(rename = "response.output_text.done", alias = "response.refusal.done")]
    OutputTextDone,
    #[serde(rename = "response.tool_call.delta")]
    ToolCallDelta(ToolCallFragment),
    #[serde(rename = "response.tool_call.done")]
    ToolCallDone(ToolCallFragment),
    #[serde(rename = "response.function_call_arguments.delta")]
    ArgumentsDelta {
        #[serde(default)]
        output_index: usize,
        delta: String,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    ArgumentsDone {
        #[serde(default)]
        output_index: usize,
        arguments: Option<String>,
    },
    #[serde(
        rename = "response.reasoning.delta",
        alias = "response.reasoning_summary_text.delta",
        alias = "response.reasoning_text.delta"
    )]
    ReasoningDelta {
        #[serde(default)]
        delta: Value,
    },
    #[serde(
        rename = "response.reasoning.done",
        alias = "response.reasoning_summary_text.done",
        alias = "response.reasoning_text.done"
    )]
    ReasoningDone,
    #[serde(
        rename = "response.completed",
        alias = "response.done",
        alias = "response.incomplete"
    )]
    Completed {
        #[serde(default)]
        response: Value,
    },
    #[serde(rename = "response.failed")]
    Failed {
        #[serde(default)]
        response: Value,
    },
    #[serde(rename = "error", alias = "response.error")]
    Error {
        code: Option<String>,
        message: Option<String>,
        error: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

/// `response.tool_call.*` payload: flat fields, or nested under `delta`.
#[derive(Debug, Default, Deserialize)]
struct ToolCallFragment {
    #[serde(alias = "index")]
    output_index: Option<usize>,
    #[serde(alias = "id")]
    call_id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
    delta: Option<Value>,
}

impl ToolCallFragment {
    fn argument_text(&self) -> Option<&str> {
        self.arguments
            .as_deref()
            .or_else(|| self.delta.as_ref().and_then(Value::as_str))
            .or_else(|| {
                self.delta
                    .as_ref()
                    .and_then(|d| d.get("arguments"))
                    .and_then(Value::as_str)
            })
    }
}

/// Delta text given either as a string or as `{content|text}`.
fn delta_text(delta: &Value) -> Option<&str> {
    delta
        .as_str()
        .or_else(|| delta.get("content").and_then(Value::as_str))
        .or_else(|| delta.get("text").and_then(Value::as_str))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsesStreamReconstructor;

impl ResponsesStreamReconstructor {
    fn apply_response_meta(&self, acc: &mut StreamAccumulator, response: &Value) {
        if let Some(id) = response.get("id").and_then(Value::as_str) {
            acc.set_response_id(id);
        }
        if let Some(model) = response.get("model").and_then(Value::as_str) {
            acc.set_model(model);
        }
    }

    fn upstream_error(&self, payload: &Value) -> LlmError {
        classify_vendor_error("openai_responses", RESPONSES_ERRORS, payload)
            .map(LlmError::UpstreamApi)
            .unwrap_or_else(|| LlmError::Format(format!("unclassifiable error event: {payload}")))
    }
}

impl StreamReconstructor for ResponsesStreamReconstructor {
    fn provider(&self) -> &'static str {
        "openai_responses"
    }

    fn apply_event(&self, acc: &mut StreamAccumulator, event: &Value) -> Result<(), LlmError> {
        let parsed = match serde_json::from_value::<ResponsesStreamEvent>(event.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                acc.warn(Warning::UnparseableStreamEvent {
                    raw: event.to_string(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        match parsed {
            ResponsesStreamEvent::Created { response } => self.apply_response_meta(acc, &response),
            ResponsesStreamEvent::OutputItemAdded { output_index, item } => {
                if item.get("type").and_then(Value::as_str) == Some("function_call") {
                    let id = item.get("call_id").or_else(|| item.get("id")).and_then(Value::as_str);
                    let name = item.get("name").and_then(Value::as_str);
                    let arguments = item.get("arguments").and_then(Value::as_str);
                    acc.tool_call_delta(output_index, id, name, arguments);
                }
            }
            ResponsesStreamEvent::OutputItemDone { output_index, item } => {
                if item.get("type").and_then(Value::as_str) == Some("function_call") {
                    if let Some(arguments) = item.get("arguments").and_then(Value::as_str) {
                        acc.set_tool_call_arguments(output_index, arguments);
                    }
                    acc.close_tool_call(output_index);
                }
            }
            ResponsesStreamEvent::OutputTextDelta { delta } => {
                if let Some(text) = delta_text(&delta) {
                    acc.append_text(text);
                }
            }
            ResponsesStreamEvent::ToolCallDelta(fragment) => {
                // Without an index a new id opens a new call; anything else continues the latest.
                let index = fragment.output_index.unwrap_or_else(|| {
                    let count = acc.tool_call_count();
                    if fragment.call_id.is_some() || count == 0 { count } else { count - 1 }
                });
                acc.tool_call_delta(
                    index,
                    fragment.call_id.as_deref(),
                    fragment.name.as_deref(),
                    fragment.argument_text(),
                );
            }
            ResponsesStreamEvent::ToolCallDone(fragment) => {
                let index = fragment
                    .output_index
                    .unwrap_or_else(|| acc.tool_call_count().saturating_sub(1));
                if let Some(arguments) = fragment.arguments.as_deref() {
                    acc.set_tool_call_arguments(index, arguments);
                }
                acc.close_tool_call(index);
            }
            ResponsesStreamEvent::ArgumentsDelta { output_index, delta } => {
                acc.tool_call_delta(output_index, None, None, Some(&delta));
            }
            ResponsesStreamEvent::ArgumentsDone {
                output_index,
                arguments,
            } => {
                if let Some(arguments) = arguments.as_deref() {
                    acc.set_tool_call_arguments(output_index, arguments);
                }
                acc.close_tool_call(output_index);
            }
            ResponsesStreamEvent::ReasoningDelta { delta } => {
                if let Some(text) = delta_text(&delta) {
                    acc.append_reasoning(text);
                }
            }
            ResponsesStreamEvent::OutputTextDone | ResponsesStreamEvent::ReasoningDone => {}
            ResponsesStreamEvent::Completed { response } => {
                self.apply_response_meta(acc, &response);
                if let Some(usage) = response.get("usage").and_then(parse_usage) {
                    acc.merge_usage(&usage);
                }
                if let Some(reason) = status_finish_reason(&response, acc.tool_call_count() > 0) {
                    acc.set_finish_reason(reason);
                }
                acc.close();
            }
            ResponsesStreamEvent::Failed { response } => {
                let payload = match response.get("error") {
                    Some(error) if !error.is_null() => json!({"error": error}),
                    _ => json!({"error": {"type": "server_error", "message": "response failed"}}),
                };
                return Err(self.upstream_error(&payload));
            }
            ResponsesStreamEvent::Error { code, message, error } => {
                let payload = match error {
                    Some(error) => json!({"error": error}),
                    None => json!({"error": {
                        "type": code.clone(),
                        "code": code,
                        "message": message.unwrap_or_default(),
                    }}),
                };
                return Err(self.upstream_error(&payload));
            }
            ResponsesStreamEvent::Unknown => {
                tracing::debug!("ignoring unknown responses stream event");
            }
        }
        Ok(())
    }
}
