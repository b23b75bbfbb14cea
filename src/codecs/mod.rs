//! Content and tool codec contracts
//!
//! Each provider implements these on a small unit struct in its own module
//! (`providers::<p>::content` and `providers::<p>::tools`).

pub mod image;

use serde_json::Value;

use crate::types::{Converted, MessageContent, ToolCall, ToolChoice, ToolDefinition};

/// Text and image blocks to and from a provider's wire shape.
pub trait ContentCodec: Send + Sync {
    /// Encode content into wire blocks. Blocks that break provider constraints are
    /// dropped with a warning; the rest still convert.
    fn encode(&self, content: &MessageContent) -> Converted<Vec<Value>>;

    /// Visible text carried by wire blocks; non-text blocks are skipped.
    fn decode(&self, blocks: &[Value]) -> String;

    /// Constraint violations in already-encoded wire blocks.
    fn validate(&self, blocks: &[Value]) -> Vec<String>;
}

/// Tool definitions, tool choice and tool calls to and from a provider's wire shape.
pub trait ToolCodec: Send + Sync {
    fn encode_tools(&self, tools: &[ToolDefinition]) -> Value;

    /// `None` means the field is omitted from the request.
    fn encode_tool_choice(&self, choice: &ToolChoice) -> Option<Value>;

    /// Extract the tool calls from a (non-streaming) vendor response.
    fn decode_tool_calls(&self, response: &Value) -> Converted<Vec<ToolCall>>;
}

/// Visible text of a JSON value that may be a string, a block list or null.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}
