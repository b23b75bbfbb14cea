//! OpenAI chat completion chunk reconstruction
//!
//! Deltas live at `choices[0].delta`. The terminal marker is a non-null
//! `finish_reason` or the `[DONE]` sentinel; with `stream_options.include_usage` the
//! usage arrives in one more chunk with empty `choices` after the finish marker.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, classify_vendor_error, taxonomy::OPENAI_ERRORS};
use crate::streaming::{StreamAccumulator, StreamReconstructor};
use crate::types::FinishReason;

use super::converter::parse_usage;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenAiStreamEvent {
    Error { error: Value },
    Chunk(OpenAiChunk),
}

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    delta: Value,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Reasoning text from OpenAI-compatible servers.
///
/// Priority order: `reasoning_content` > `thinking` > `reasoning`.
pub(crate) fn extract_thinking(value: &Value) -> Option<&str> {
    ["reasoning_content", "thinking", "reasoning"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiStreamReconstructor;

impl OpenAiStreamReconstructor {
    fn apply_delta(&self, acc: &mut StreamAccumulator, delta: &Value) {
        if let Some(text) = delta.get("content").and_then(Value::as_str) {
            acc.append_text(text);
        }
        if let Some(thinking) = extract_thinking(delta) {
            acc.append_reasoning(thinking);
        }
        let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) else {
            return;
        };
        for raw in calls {
            let call: OpenAiToolCallDelta = match serde_json::from_value(raw.clone()) {
                Ok(call) => call,
                Err(e) => {
                    tracing::warn!("skipping malformed tool call delta: {e}");
                    continue;
                }
            };
            // Some compatible servers omit the index: a new id opens a new call, anything
            // else continues the latest one.
            let index = call.index.unwrap_or_else(|| {
                let count = acc.tool_call_count();
                if call.id.is_some() || count == 0 {
                    count
                } else {
                    count - 1
                }
            });
            let function = call.function.as_ref();
            acc.tool_call_delta(
                index,
                call.id.as_deref(),
                function.and_then(|f| f.name.as_deref()),
                function.and_then(|f| f.arguments.as_deref()),
            );
        }
    }
}

impl StreamReconstructor for OpenAiStreamReconstructor {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn apply_event(&self, acc: &mut StreamAccumulator, event: &Value) -> Result<(), LlmError> {
        let chunk = match serde_json::from_value::<OpenAiStreamEvent>(event.clone()) {
            Ok(OpenAiStreamEvent::Error { error }) => {
                return Err(classify_vendor_error("openai", OPENAI_ERRORS, event)
                    .map(LlmError::UpstreamApi)
                    .unwrap_or_else(|| {
                        LlmError::Format(format!("unclassifiable error event: {error}"))
                    }));
            }
            Ok(OpenAiStreamEvent::Chunk(chunk)) => chunk,
            Err(e) => {
                acc.warn(crate::error::Warning::UnparseableStreamEvent {
                    raw: event.to_string(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        if let Some(id) = &chunk.id {
            acc.set_response_id(id);
        }
        if let Some(model) = &chunk.model {
            acc.set_model(model);
        }
        if let Some(usage) = chunk.usage.as_ref().and_then(parse_usage) {
            acc.merge_usage(&usage);
        }

        for choice in &chunk.choices {
            if choice.index != 0 {
                tracing::debug!(index = choice.index, "ignoring delta for secondary choice");
                continue;
            }
            self.apply_delta(acc, &choice.delta);
            if let Some(reason) = &choice.finish_reason {
                acc.set_finish_reason(FinishReason::from_vendor(reason));
                acc.close();
            }
        }
        Ok(())
    }
}
