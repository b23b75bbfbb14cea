//! OpenAI chat content blocks

use serde_json::{Value, json};

use crate::codecs::ContentCodec;
use crate::codecs::image::{ImageConstraints, OPENAI_IMAGES};
use crate::error::Warning;
use crate::types::{ContentBlock, Converted, MessageContent};

/// `{type:"text"}` and `{type:"image_url", image_url:{url}}` parts.
#[derive(Debug, Clone, Copy)]
pub struct OpenAiContentCodec {
    pub images: ImageConstraints,
}

impl Default for OpenAiContentCodec {
    fn default() -> Self {
        Self {
            images: OPENAI_IMAGES,
        }
    }
}

impl ContentCodec for OpenAiContentCodec {
    fn encode(&self, content: &MessageContent) -> Converted<Vec<Value>> {
        let mut warnings = Vec::new();
        let parts = content
            .blocks()
            .into_iter()
            .filter_map(|block| match self.images.check_block(&block) {
                Err(w) => {
                    warnings.push(w);
                    None
                }
                Ok(()) => Some(match &block {
                    ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                    ContentBlock::Image { .. } => json!({
                        "type": "image_url",
                        "image_url": {"url": block.image_as_url().unwrap_or_default()}
                    }),
                }),
            })
            .collect();
        Converted::with_warnings(parts, warnings)
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
                Some("text") => {
                    if !block.get("text").is_some_and(Value::is_string) {
                        errors.push(format!("content[{i}] text part without text"));
                    }
                }
                Some("image_url") => {
                    let url = block
                        .get("image_url")
                        .and_then(|u| u.get("url"))
                        .and_then(Value::as_str);
                    match url {
                        None => errors.push(format!("content[{i}] image_url part without url")),
                        Some(url) => {
                            if let Some(ContentBlock::Image {
                                media_type,
                                data,
                                source,
                            }) = ContentBlock::from_data_url(url)
                                && let Some(reason) = self.images.check(&media_type, &data, source)
                            {
                                errors.push(format!("content[{i}] {reason}"));
                            }
                        }
                    }
                }
                Some(other) => errors.push(format!("content[{i}] has unsupported type '{other}'")),
                None => errors.push(format!("content[{i}] has no type")),
            }
        }
        errors
    }
}

/// Drop image blocks from content that only accepts text, with a warning each.
pub(crate) fn text_only(
    content: &MessageContent,
    role: &str,
    warnings: &mut Vec<Warning>,
) -> String {
    if content.has_images() {
        warnings.push(
            Warning::content_violation(format!(
                "{role} messages cannot carry images, image dropped"
            ))
            .logged(),
        );
    }
    content.text()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmp_image_dropped_text_kept() {
        let content = MessageContent::Blocks(vec![
            ContentBlock::text("describe this"),
            ContentBlock::image_base64("image/bmp", "Qk0="),
        ]);
        let converted = OpenAiContentCodec::default().encode(&content);
        assert_eq!(converted.value, vec![json!({"type": "text", "text": "describe this"})]);
        assert!(matches!(
            converted.warnings.as_slice(),
            [Warning::ContentConstraintViolation { reason }] if reason.contains("image/bmp")
        ));
    }

    #[test]
    fn base64_image_becomes_data_url() {
        let content =
            MessageContent::Blocks(vec![ContentBlock::image_base64("image/png", "iVBORw0KGgo=")]);
        let converted = OpenAiContentCodec::default().encode(&content);
        assert_eq!(
            converted.value[0]["image_url"]["url"],
            "data:image/png;base64,iVBORw0KGgo="
        );
    }

    #[test]
    fn validate_wire_blocks() {
        let codec = OpenAiContentCodec::default();
        let errors = codec.validate(&[
            json!({"type": "text", "text": "ok"}),
            json!({"type": "image_url", "image_url": {"url": "data:image/tiff;base64,AAAA"}}),
            json!({"type": "audio"}),
        ]);
        assert_eq!(errors.len(), 2);
        assert_eq!(
            codec.decode(&[
                json!({"type": "text", "text": "a"}),
                json!({"type": "text", "text": "b"})
            ]),
            "ab"
        );
    }
}
