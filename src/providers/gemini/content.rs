//! Gemini content parts

use serde_json::{Value, json};

use crate::codecs::ContentCodec;
use crate::codecs::image::{GEMINI_IMAGES, ImageConstraints, normalize_media_type};
use crate::types::{ContentBlock, Converted, ImageSource, MessageContent};

/// `{text}`, `{inline_data:{mime_type,data}}` and `{file_data:{mime_type,file_uri}}` parts.
#[derive(Debug, Clone, Copy)]
pub struct GeminiContentCodec {
    pub images: ImageConstraints,
}

impl Default for GeminiContentCodec {
    fn default() -> Self {
        Self {
            images: GEMINI_IMAGES,
        }
    }
}

/// Gemini responses use camelCase keys, requests accept either.
pub(crate) fn part_field<'a>(part: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    part.get(snake).or_else(|| part.get(camel))
}

pub(crate) fn is_thought(part: &Value) -> bool {
    part.get("thought").and_then(Value::as_bool).unwrap_or(false)
}

impl ContentCodec for GeminiContentCodec {
    fn encode(&self, content: &MessageContent) -> Converted<Vec<Value>> {
        let mut warnings = Vec::new();
        let mut parts = Vec::new();
        for block in content.blocks() {
            if let Err(w) = self.images.check_block(&block) {
                warnings.push(w);
                continue;
            }
            parts.push(match block {
                ContentBlock::Text { text } => json!({"text": text}),
                ContentBlock::Image {
                    media_type,
                    data,
                    source: ImageSource::Base64,
                } => json!({
                    "inline_data": {"mime_type": normalize_media_type(&media_type), "data": data}
                }),
                ContentBlock::Image {
                    media_type,
                    data,
                    source: ImageSource::Url,
                } => json!({
                    "file_data": {"mime_type": normalize_media_type(&media_type), "file_uri": data}
                }),
            });
        }
        Converted::with_warnings(parts, warnings)
    }

    /// Visible text only; `thought` parts are reasoning.
    fn decode(&self, blocks: &[Value]) -> String {
        blocks
            .iter()
            .filter(|p| !is_thought(p))
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("")
    }

    fn validate(&self, blocks: &[Value]) -> Vec<String> {
        let mut errors = Vec::new();
        for (i, part) in blocks.iter().enumerate() {
            if part.get("text").is_some() {
                if !part["text"].is_string() {
                    errors.push(format!("parts[{i}] text is not a string"));
                }
            } else if let Some(inline) = part_field(part, "inline_data", "inlineData") {
                let mime = part_field(inline, "mime_type", "mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
                if let Some(reason) = self.images.check(mime, data, ImageSource::Base64) {
                    errors.push(format!("parts[{i}] {reason}"));
                }
            } else if let Some(file) = part_field(part, "file_data", "fileData") {
                if part_field(file, "file_uri", "fileUri").and_then(Value::as_str).is_none() {
                    errors.push(format!("parts[{i}] file_data without file_uri"));
                }
            } else if part_field(part, "function_call", "functionCall").is_none()
                && part_field(part, "function_response", "functionResponse").is_none()
            {
                errors.push(format!("parts[{i}] has no recognised payload"));
            }
        }
        errors
    }
}
