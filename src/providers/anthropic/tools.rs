//! Anthropic tools and `tool_use` blocks

use serde_json::{Value, json};

use crate::codecs::ToolCodec;
use crate::error::Warning;
use crate::types::{Converted, ToolCall, ToolChoice, ToolDefinition};

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicToolCodec;

impl ToolCodec for AnthropicToolCodec {
    fn encode_tools(&self, tools: &[ToolDefinition]) -> Value {
        Value::Array(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect(),
        )
    }

    /// `None` has no wire form: the converter removes the tools instead.
    fn encode_tool_choice(&self, choice: &ToolChoice) -> Option<Value> {
        match choice {
            ToolChoice::Auto => Some(json!({"type": "auto"})),
            ToolChoice::Any => Some(json!({"type": "any"})),
            ToolChoice::Specific { name } => Some(json!({"type": "tool", "name": name})),
            ToolChoice::None => None,
        }
    }

    fn decode_tool_calls(&self, response: &Value) -> Converted<Vec<ToolCall>> {
        let mut warnings = Vec::new();
        let calls = response
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"))
                    .filter_map(|b| {
                        let Some(name) = b.get("name").and_then(Value::as_str) else {
                            warnings.push(
                                Warning::response_shape("tool_use block without name skipped")
                                    .logged(),
                            );
                            return None;
                        };
                        let id = b
                            .get("id")
                            .and_then(Value::as_str)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .unwrap_or_else(ToolCall::synthesize_id);
                        Some(match b.get("input") {
                            Some(Value::String(raw)) => ToolCall::from_raw_arguments(id, name, raw)
                                .drain_into(&mut warnings),
                            Some(input) => ToolCall::new(id, name, input.clone()),
                            None => ToolCall::new(id, name, Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Converted::with_warnings(calls, warnings)
    }
}

/// Assistant tool calls as `tool_use` blocks.
pub(crate) fn encode_tool_use(call: &ToolCall) -> Value {
    json!({
        "type": "tool_use",
        "id": call.id,
        "name": call.function_name,
        "input": Value::Object(call.arguments.clone()),
    })
}
