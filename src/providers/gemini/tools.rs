//! Gemini function declarations and `functionCall` parts

use serde_json::{Value, json};

use super::content::part_field;
use crate::codecs::ToolCodec;
use crate::error::Warning;
use crate::types::{Converted, ToolCall, ToolChoice, ToolDefinition};

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiToolCodec;

impl ToolCodec for GeminiToolCodec {
    /// All declarations go into a single tool entry.
    fn encode_tools(&self, tools: &[ToolDefinition]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();
        json!([{"function_declarations": declarations}])
    }

    fn encode_tool_choice(&self, choice: &ToolChoice) -> Option<Value> {
        let config = match choice {
            ToolChoice::Auto => json!({"mode": "AUTO"}),
            ToolChoice::None => json!({"mode": "NONE"}),
            ToolChoice::Any => json!({"mode": "ANY"}),
            ToolChoice::Specific { name } => json!({"mode": "ANY", "allowedFunctionNames": [name]}),
        };
        Some(json!({"functionCallingConfig": config}))
    }

    fn decode_tool_calls(&self, response: &Value) -> Converted<Vec<ToolCall>> {
        let mut warnings = Vec::new();
        let parts = response
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let calls = parts
            .iter()
            .filter_map(|part| decode_function_call(part, &mut warnings))
            .collect();
        Converted::with_warnings(calls, warnings)
    }
}

/// A `functionCall` part; Gemini sends them complete, usually without an id.
pub(crate) fn decode_function_call(part: &Value, warnings: &mut Vec<Warning>) -> Option<ToolCall> {
    let call = part_field(part, "function_call", "functionCall")?;
    let Some(name) = call.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()) else {
        warnings.push(Warning::response_shape("functionCall part without name skipped").logged());
        return None;
    };
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(ToolCall::synthesize_id);
    Some(match call.get("args") {
        Some(Value::String(raw)) => {
            ToolCall::from_raw_arguments(id, name, raw).drain_into(warnings)
        }
        Some(args) => ToolCall::new(id, name, args.clone()),
        None => ToolCall::new(id, name, Value::Null),
    })
}

/// Assistant tool calls as `function_call` parts.
pub(crate) fn encode_function_call(call: &ToolCall) -> Value {
    json!({
        "function_call": {"name": call.function_name, "args": Value::Object(call.arguments.clone())}
    })
}
