//! Canonical message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Metadata;
use super::tools::ToolCall;
use super::usage::{FinishReason, Usage};

/// Well-known metadata keys written by the converters.
pub mod metadata_keys {
    pub const PROVIDER: &str = "provider";
    pub const MODEL: &str = "model";
    pub const RESPONSE_ID: &str = "response_id";
    pub const FINISH_REASON: &str = "finish_reason";
    pub const USAGE: &str = "usage";
    pub const REASONING: &str = "reasoning";
    pub const WARNINGS: &str = "warnings";
}

/// Role-specific part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    System,
    Tool {
        #[serde(
            default = "synthesized_tool_call_id",
            deserialize_with = "tool_call_id_or_synthesized"
        )]
        tool_call_id: String,
    },
}

/// Deserialized tool results get the same id guarantee as [`Message::tool`].
fn tool_call_id_or_synthesized<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    if !id.trim().is_empty() {
        return Ok(id);
    }
    Ok(synthesized_tool_call_id())
}

fn synthesized_tool_call_id() -> String {
    let id = ToolCall::synthesize_id();
    tracing::warn!("tool message without tool_call_id, synthesized {}", id);
    id
}

/// Where an image payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// `data` holds a base64 payload.
    Base64,
    /// `data` holds a URL.
    Url,
}

/// One unit of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        media_type: String,
        data: String,
        source: ImageSource,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image {
            media_type: media_type.into(),
            data: data.into(),
            source: ImageSource::Base64,
        }
    }

    pub fn image_url(url: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::Image {
            media_type: media_type.into(),
            data: url.into(),
            source: ImageSource::Url,
        }
    }

    /// Parse a `data:<media_type>;base64,<payload>` URL into an image block.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let media_type = header.split(';').next().unwrap_or_default();
        if !header.contains(";base64") || media_type.is_empty() {
            return None;
        }
        Some(Self::image_base64(media_type, payload))
    }

    /// Render an image as a URL: data URL for base64 payloads, the URL itself otherwise.
    pub fn image_as_url(&self) -> Option<String> {
        match self {
            Self::Image {
                media_type,
                data,
                source: ImageSource::Base64,
            } => Some(format!("data:{media_type};base64,{data}")),
            Self::Image {
                data,
                source: ImageSource::Url,
                ..
            } => Some(data.clone()),
            Self::Text { .. } => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Message content: plain text or an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// All text in the content; text blocks are joined with a newline.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Blocks(blocks) => blocks.is_empty(),
        }
    }

    /// Content as blocks; plain text becomes a single text block (none when empty).
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![ContentBlock::text(text.clone())],
            Self::Blocks(blocks) => blocks.clone(),
        }
    }

    pub fn has_images(&self) -> bool {
        matches!(
            self,
            Self::Blocks(blocks) if blocks.iter().any(|b| matches!(b, ContentBlock::Image { .. }))
        )
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Blocks(blocks)
    }
}

/// A chat turn in the vendor-agnostic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: Metadata,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_kind(kind: MessageKind, content: MessageContent) -> Self {
        Self {
            kind,
            content,
            name: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::with_kind(MessageKind::Human, content.into())
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::with_kind(MessageKind::System, content.into())
    }

    pub fn ai(content: impl Into<MessageContent>) -> Self {
        Self::ai_with_tool_calls(content, Vec::new())
    }

    pub fn ai_with_tool_calls(
        content: impl Into<MessageContent>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self::with_kind(MessageKind::Ai { tool_calls }, content.into())
    }

    /// Tool result answering `tool_call_id`.
    ///
    /// An empty id is replaced by a synthesized one so the message stays well-formed.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        let mut tool_call_id = tool_call_id.into();
        if tool_call_id.trim().is_empty() {
            tool_call_id = ToolCall::synthesize_id();
            tracing::warn!(
                "tool message without tool_call_id, synthesized {}",
                tool_call_id
            );
        }
        Self::with_kind(MessageKind::Tool { tool_call_id }, content.into())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Canonical role name: `human`, `ai`, `system` or `tool`.
    pub fn role_name(&self) -> &'static str {
        match self.kind {
            MessageKind::Human => "human",
            MessageKind::Ai { .. } => "ai",
            MessageKind::System => "system",
            MessageKind::Tool { .. } => "tool",
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self.kind, MessageKind::Human)
    }

    pub fn is_ai(&self) -> bool {
        matches!(self.kind, MessageKind::Ai { .. })
    }

    pub fn is_system(&self) -> bool {
        matches!(self.kind, MessageKind::System)
    }

    pub fn is_tool(&self) -> bool {
        matches!(self.kind, MessageKind::Tool { .. })
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.kind {
            MessageKind::Ai { tool_calls } => tool_calls,
            _ => &[],
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Tool { tool_call_id } => Some(tool_call_id),
            _ => None,
        }
    }

    /// Text content of the message.
    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn model(&self) -> Option<&str> {
        self.metadata
            .get(metadata_keys::MODEL)
            .and_then(|v| v.as_str())
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.metadata
            .get(metadata_keys::FINISH_REASON)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn usage(&self) -> Option<Usage> {
        self.metadata
            .get(metadata_keys::USAGE)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Reasoning ("thinking") text surfaced by providers that expose it.
    pub fn reasoning(&self) -> Option<&str> {
        self.metadata
            .get(metadata_keys::REASONING)
            .and_then(|v| v.as_str())
    }

    /// Warnings recorded while this message was produced.
    pub fn warnings(&self) -> Vec<String> {
        self.metadata
            .get(metadata_keys::WARNINGS)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|w| w.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append warnings to `metadata.warnings`.
    pub fn record_warnings(&mut self, warnings: &[crate::error::Warning]) {
        if warnings.is_empty() {
            return;
        }
        let entry = self
            .metadata
            .entry(metadata_keys::WARNINGS.to_string())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = serde_json::Value::Array(Vec::new());
        }
        if let serde_json::Value::Array(items) = entry {
            items.extend(
                warnings
                    .iter()
                    .map(|w| serde_json::Value::String(w.to_string())),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Warning;
    use serde_json::json;

    #[test]
    fn serializes_role_tag_flat() {
        let msg = Message::tool("call_9", "42");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call_9");
        assert_eq!(v["content"], "42");

        let back: Message = serde_json::from_value(v).unwrap();
        assert_eq!(back.tool_call_id(), Some("call_9"));
    }

    #[test]
    fn ai_tool_calls_round_trip() {
        let call = ToolCall::new("call_1", "lookup", json!({"q": "rust"}));
        let msg = Message::ai_with_tool_calls("", vec![call.clone()]);
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "ai");
        let back: Message = serde_json::from_value(v).unwrap();
        assert_eq!(back.tool_calls(), &[call]);
    }

    #[test]
    fn empty_tool_call_id_is_synthesized() {
        let msg = Message::tool("  ", "result");
        let id = msg.tool_call_id().unwrap();
        assert!(id.starts_with("call_"));
        assert!(id.len() > "call_".len());
    }

    #[test]
    fn deserialized_tool_message_never_has_empty_id() {
        let msg: Message = serde_json::from_value(
            serde_json::json!({"role": "tool", "tool_call_id": "", "content": "x"}),
        )
        .unwrap();
        assert!(msg.tool_call_id().unwrap().starts_with("call_"));

        let msg: Message = serde_json::from_value(
            serde_json::json!({"role": "tool", "tool_call_id": null, "content": "x"}),
        )
        .unwrap();
        assert!(!msg.tool_call_id().unwrap().is_empty());

        let msg: Message =
            serde_json::from_value(serde_json::json!({"role": "tool", "content": "x"})).unwrap();
        assert!(msg.tool_call_id().unwrap().starts_with("call_"));

        let msg: Message = serde_json::from_value(
            serde_json::json!({"role": "tool", "tool_call_id": "call_7", "content": "x"}),
        )
        .unwrap();
        assert_eq!(msg.tool_call_id(), Some("call_7"));
    }

    #[test]
    fn data_url_parsing() {
        let block = ContentBlock::from_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(block, ContentBlock::image_base64("image/png", "iVBORw0KGgo="));
        assert_eq!(
            block.image_as_url().unwrap(),
            "data:image/png;base64,iVBORw0KGgo="
        );
        assert!(ContentBlock::from_data_url("https://example.com/a.png").is_none());
        assert!(ContentBlock::from_data_url("data:text/plain,hello").is_none());
    }

    #[test]
    fn content_text_joins_blocks() {
        let content = MessageContent::Blocks(vec![
            ContentBlock::text("a"),
            ContentBlock::image_url("https://x/y.png", "image/png"),
            ContentBlock::text("b"),
        ]);
        assert_eq!(content.text(), "a\nb");
        assert!(content.has_images());
        assert!(MessageContent::Text(String::new()).blocks().is_empty());
    }

    #[test]
    fn warnings_accumulate_in_metadata() {
        let mut msg = Message::ai("hi");
        msg.record_warnings(&[Warning::degraded("first")]);
        msg.record_warnings(&[Warning::degraded("second")]);
        assert_eq!(msg.warnings(), vec!["first".to_string(), "second".to_string()]);
    }
}
