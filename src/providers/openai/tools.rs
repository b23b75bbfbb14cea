//! OpenAI function tools

use serde_json::{Value, json};

use crate::codecs::ToolCodec;
use crate::error::Warning;
use crate::providers::raw_arguments;
use crate::types::{Converted, ToolCall, ToolChoice, ToolDefinition};

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiToolCodec;

impl ToolCodec for OpenAiToolCodec {
    fn encode_tools(&self, tools: &[ToolDefinition]) -> Value {
        Value::Array(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect(),
        )
    }

    fn encode_tool_choice(&self, choice: &ToolChoice) -> Option<Value> {
        Some(match choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
            ToolChoice::Any => json!("required"),
            ToolChoice::Specific { name } => {
                json!({"type": "function", "function": {"name": name}})
            }
        })
    }

    fn decode_tool_calls(&self, response: &Value) -> Converted<Vec<ToolCall>> {
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .unwrap_or(response);
        decode_message_tool_calls(message)
    }
}

/// Tool calls of one assistant message, including the legacy `function_call` field.
pub(crate) fn decode_message_tool_calls(message: &Value) -> Converted<Vec<ToolCall>> {
    let mut warnings = Vec::new();
    let mut calls = Vec::new();
    if let Some(items) = message.get("tool_calls").and_then(Value::as_array) {
        for item in items {
            let Some(name) = item
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
            else {
                warnings.push(
                    Warning::response_shape("tool call without function name skipped").logged(),
                );
                continue;
            };
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(ToolCall::synthesize_id);
            let raw = raw_arguments(item.get("function").and_then(|f| f.get("arguments")));
            calls.push(ToolCall::from_raw_arguments(id, name, &raw).drain_into(&mut warnings));
        }
    } else if let Some(function) = message.get("function_call")
        && let Some(name) = function.get("name").and_then(Value::as_str)
    {
        let raw = raw_arguments(function.get("arguments"));
        let call = ToolCall::from_raw_arguments(ToolCall::synthesize_id(), name, &raw);
        calls.push(call.drain_into(&mut warnings));
    }
    Converted::with_warnings(calls, warnings)
}

/// Assistant `tool_calls` field for outgoing history.
pub(crate) fn encode_tool_calls(calls: &[ToolCall]) -> Value {
    Value::Array(
        calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {"name": call.function_name, "arguments": call.arguments_json()}
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_choice_tokens() {
        let codec = OpenAiToolCodec;
        assert_eq!(codec.encode_tool_choice(&ToolChoice::Any), Some(json!("required")));
        assert_eq!(
            codec.encode_tool_choice(&ToolChoice::specific("f")),
            Some(json!({"type": "function", "function": {"name": "f"}}))
        );
    }

    #[test]
    fn decodes_calls_and_degrades_bad_json() {
        let response = json!({"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_1", "function": {"name": "a", "arguments": "{\"x\":1}"}},
                {"id": "call_2", "function": {"name": "b", "arguments": "{invalid"}}
            ]
        }}]});
        let converted = OpenAiToolCodec.decode_tool_calls(&response);
        assert_eq!(converted.value.len(), 2);
        assert_eq!(converted.value[0].arguments["x"], 1);
        assert!(converted.value[1].arguments.is_empty());
        assert_eq!(converted.warnings.len(), 1);
    }

    #[test]
    fn legacy_function_call() {
        let message = json!({"function_call": {"name": "f", "arguments": "{}"}});
        let converted = decode_message_tool_calls(&message);
        assert_eq!(converted.value[0].function_name, "f");
    }

    #[test]
    fn encodes_history_calls() {
        let calls = encode_tool_calls(&[ToolCall::new("c", "f", json!({"a": 1}))]);
        assert_eq!(calls[0]["function"]["arguments"], "{\"a\":1}");
    }
}
