//! Anthropic content blocks

use serde_json::{Value, json};

use crate::codecs::ContentCodec;
use crate::codecs::image::{ANTHROPIC_IMAGES, ImageConstraints, normalize_media_type};
use crate::types::{ContentBlock, Converted, ImageSource, MessageContent};

/// `{type:"text"}` and `{type:"image", source:{...}}` blocks.
#[derive(Debug, Clone, Copy)]
pub struct AnthropicContentCodec {
    pub images: ImageConstraints,
}

impl Default for AnthropicContentCodec {
    fn default() -> Self {
        Self {
            images: ANTHROPIC_IMAGES,
        }
    }
}

impl ContentCodec for AnthropicContentCodec {
    fn encode(&self, content: &MessageContent) -> Converted<Vec<Value>> {
        let mut warnings = Vec::new();
        let mut blocks = Vec::new();
        for block in content.blocks() {
            if let Err(w) = self.images.check_block(&block) {
                warnings.push(w);
                continue;
            }
            blocks.push(match block {
                ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                ContentBlock::Image {
                    media_type,
                    data,
                    source: ImageSource::Base64,
                } => json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": normalize_media_type(&media_type),
                        "data": data
                    }
                }),
                ContentBlock::Image {
                    data,
                    source: ImageSource::Url,
                    ..
                } => json!({"type": "image", "source": {"type": "url", "url": data}}),
            });
        }
        Converted::with_warnings(blocks, warnings)
    }

    fn decode(&self, blocks: &[Value]) -> String {
        blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("")
    }

    fn validate(&self, blocks: &[Value]) -> Vec<String> {
        let mut errors = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            match block.get("type").and_then(Value::as_str) {
                Some("text") if block.get("text").is_some_and(Value::is_string) => {}
                Some("text") => errors.push(format!("content[{i}] text block without text")),
                Some("image") => {
                    let source = block.get("source").unwrap_or(&Value::Null);
                    match source.get("type").and_then(Value::as_str) {
                        Some("base64") => {
                            let field = |key: &str| source.get(key).and_then(Value::as_str);
                            let media_type = field("media_type").unwrap_or_default();
                            let data = field("data").unwrap_or_default();
                            if let Some(reason) =
                                self.images.check(media_type, data, ImageSource::Base64)
                            {
                                errors.push(format!("content[{i}] {reason}"));
                            }
                        }
                        Some("url") => {}
                        _ => errors.push(format!("content[{i}] image block has an invalid source")),
                    }
                }
                Some("tool_use" | "tool_result" | "thinking" | "redacted_thinking") => {}
                Some(other) => errors.push(format!("content[{i}] has unsupported type '{other}'")),
                None => errors.push(format!("content[{i}] has no type")),
            }
        }
        errors
    }
}
