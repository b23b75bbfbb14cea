//! Responses function tools and `function_call` output items

use serde_json::{Value, json};

use crate::codecs::ToolCodec;
use crate::error::Warning;
use crate::providers::openai::tools::decode_message_tool_calls;
use crate::providers::raw_arguments;
use crate::types::{Converted, ToolCall, ToolChoice, ToolDefinition};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsesToolCodec;

impl ToolCodec for ResponsesToolCodec {
    /// Flattened: no `function` wrapper.
    fn encode_tools(&self, tools: &[ToolDefinition]) -> Value {
        Value::Array(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
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
            ToolChoice::Specific { name } => json!({"type": "function", "name": name}),
        })
    }

    /// Native `output` items, or the chat-compatible `choices[0].message`.
    fn decode_tool_calls(&self, response: &Value) -> Converted<Vec<ToolCall>> {
        if let Some(message) = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
        {
            return decode_message_tool_calls(message);
        }
        let mut warnings = Vec::new();
        let calls = response
            .get("output")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        item.get("type").and_then(Value::as_str) == Some("function_call")
                    })
                    .filter_map(|item| decode_function_call_item(item, &mut warnings))
                    .collect()
            })
            .unwrap_or_default();
        Converted::with_warnings(calls, warnings)
    }
}

/// One `{type:"function_call", call_id, name, arguments}` item.
pub(crate) fn decode_function_call_item(
    item: &Value,
    warnings: &mut Vec<Warning>,
) -> Option<ToolCall> {
    let Some(name) = item.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()) else {
        warnings.push(Warning::response_shape("function_call item without name skipped").logged());
        return None;
    };
    let id = ["call_id", "id"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(ToolCall::synthesize_id);
    let raw = raw_arguments(item.get("arguments"));
    Some(ToolCall::from_raw_arguments(id, name, &raw).drain_into(warnings))
}

/// Assistant tool calls replayed as `function_call` input items.
pub(crate) fn encode_function_call_item(call: &ToolCall) -> Value {
    json!({
        "type": "function_call",
        "call_id": call.id,
        "name": call.function_name,
        "arguments": call.arguments_json(),
    })
}
