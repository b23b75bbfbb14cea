//! Flat chat-role records
//!
//! Callers outside the adapter exchange messages as flat `{role, content, name,
//! tool_calls, tool_call_id, metadata}` records or plain JSON maps of that shape.
//! Ingest never fails: unknown roles become human turns and odd content is coerced to
//! text. Problems met on the way are returned as warnings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::{ContentBlock, Message, MessageContent, MessageKind};
use super::tools::ToolCall;
use super::{Converted, Metadata};
use crate::error::Warning;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub role: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: Metadata,
}

/// Canonical kind inferred from a role string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Human,
    Ai,
    System,
    Tool,
}

impl RoleKind {
    /// Unrecognized roles are treated as human turns.
    pub fn infer(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "assistant" | "ai" | "model" => Self::Ai,
            "system" | "developer" => Self::System,
            "tool" | "function" => Self::Tool,
            _ => Self::Human,
        }
    }

    pub fn record_role(self) -> &'static str {
        match self {
            Self::Human => "user",
            Self::Ai => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl ChatRecord {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            metadata: Metadata::new(),
        }
    }

    /// Flatten a canonical message.
    pub fn from_message(message: &Message) -> Self {
        let role = match message.kind {
            MessageKind::Human => RoleKind::Human,
            MessageKind::Ai { .. } => RoleKind::Ai,
            MessageKind::System => RoleKind::System,
            MessageKind::Tool { .. } => RoleKind::Tool,
        };
        let content = match &message.content {
            MessageContent::Text(text) => Value::String(text.clone()),
            MessageContent::Blocks(blocks) => {
                serde_json::to_value(blocks).unwrap_or_else(|_| Value::Array(Vec::new()))
            }
        };
        Self {
            role: role.record_role().to_string(),
            content,
            name: message.name.clone(),
            tool_calls: message.tool_calls().to_vec(),
            tool_call_id: message.tool_call_id().map(str::to_string),
            metadata: message.metadata.clone(),
        }
    }

    /// Build the canonical message this record describes.
    pub fn to_message(&self) -> Converted<Message> {
        let mut warnings = Vec::new();
        let content = coerce_content(&self.content, &mut warnings);
        let mut message = match RoleKind::infer(&self.role) {
            RoleKind::Human => Message::human(content),
            RoleKind::System => Message::system(content),
            RoleKind::Ai => Message::ai_with_tool_calls(content, self.tool_calls.clone()),
            RoleKind::Tool => {
                let id = self.tool_call_id.clone().unwrap_or_default();
                if id.trim().is_empty() {
                    warnings.push(
                        Warning::degraded(format!(
                            "{} record without tool_call_id, id synthesized",
                            self.role
                        ))
                        .logged(),
                    );
                }
                Message::tool(id, content)
            }
        };
        message.name = self.name.clone();
        message.metadata = self.metadata.clone();
        Converted::with_warnings(message, warnings)
    }

    /// Lenient ingest from an open map.
    ///
    /// Tool calls may use the canonical shape `{id, name, arguments}` or the OpenAI shape
    /// `{id, function: {name, arguments: "<json>"}}`.
    pub fn from_map(map: &Map<String, Value>) -> Converted<Self> {
        let mut warnings = Vec::new();
        let role = map
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("user")
            .to_string();
        let tool_calls = match map.get("tool_calls") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| ingest_tool_call(item, &mut warnings))
                .collect(),
            _ => Vec::new(),
        };
        let metadata = match map.get("metadata") {
            Some(Value::Object(m)) => m.clone(),
            _ => Metadata::new(),
        };
        let record = Self {
            role,
            content: map.get("content").cloned().unwrap_or(Value::Null),
            name: map.get("name").and_then(Value::as_str).map(str::to_string),
            tool_calls,
            tool_call_id: map
                .get("tool_call_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata,
        };
        Converted::with_warnings(record, warnings)
    }

    /// Open map view of this record.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

impl From<&Message> for ChatRecord {
    fn from(message: &Message) -> Self {
        Self::from_message(message)
    }
}

fn ingest_tool_call(item: &Value, warnings: &mut Vec<Warning>) -> Option<ToolCall> {
    let obj = item.as_object()?;
    let function = obj.get("function").and_then(Value::as_object);
    let name = function
        .and_then(|f| f.get("name"))
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)?;
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(ToolCall::synthesize_id);
    let arguments = function
        .and_then(|f| f.get("arguments"))
        .or_else(|| obj.get("arguments"));
    match arguments {
        Some(Value::String(raw)) => {
            Some(ToolCall::from_raw_arguments(id, name, raw).drain_into(warnings))
        }
        Some(other) => Some(ToolCall::new(id, name, other.clone())),
        None => Some(ToolCall::new(id, name, Value::Null)),
    }
}

/// Coerce arbitrary record content into canonical content.
pub(crate) fn coerce_content(content: &Value, warnings: &mut Vec<Warning>) -> MessageContent {
    match content {
        Value::Null => MessageContent::Text(String::new()),
        Value::String(s) => MessageContent::Text(s.clone()),
        Value::Array(items) => {
            MessageContent::Blocks(items.iter().map(|i| coerce_block(i, warnings)).collect())
        }
        other => MessageContent::Text(other.to_string()),
    }
}

fn coerce_block(item: &Value, warnings: &mut Vec<Warning>) -> ContentBlock {
    if let Some(text) = item.as_str() {
        return ContentBlock::text(text);
    }
    if let Ok(block) = serde_json::from_value::<ContentBlock>(item.clone()) {
        return block;
    }
    let kind = item.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "text" | "input_text" | "output_text" => {
            if let Some(text) = item.get("text").and_then(Value::as_str) {
                return ContentBlock::text(text);
            }
        }
        "image_url" | "input_image" => {
            let url = item
                .get("image_url")
                .and_then(|u| u.get("url").or(Some(u)))
                .and_then(Value::as_str);
            if let Some(url) = url {
                return ContentBlock::from_data_url(url).unwrap_or_else(|| {
                    ContentBlock::image_url(url, crate::codecs::image::guess_media_type(url))
                });
            }
        }
        "image" => {
            let source = item.get("source");
            let media_type = source
                .and_then(|s| s.get("media_type"))
                .and_then(Value::as_str);
            if let (Some(data), Some(mt)) = (
                source.and_then(|s| s.get("data")).and_then(Value::as_str),
                media_type,
            ) {
                return ContentBlock::image_base64(mt, data);
            }
            if let Some(url) = source.and_then(|s| s.get("url")).and_then(Value::as_str) {
                return ContentBlock::image_url(
                    url,
                    media_type.unwrap_or_else(|| crate::codecs::image::guess_media_type(url)),
                );
            }
        }
        _ => {}
    }
    let rendered = item.to_string();
    warnings.push(
        Warning::degraded(format!("unrecognized content item kept as text: {rendered}")).logged(),
    );
    ContentBlock::text(rendered)
}
