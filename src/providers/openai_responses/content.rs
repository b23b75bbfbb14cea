//! Responses input and output content parts

use serde_json::{Value, json};

use crate::codecs::ContentCodec;
use crate::codecs::image::{ImageConstraints, RESPONSES_IMAGES};
use crate::error::Warning;
use crate::types::{ContentBlock, Converted, MessageContent};

/// `{type:"input_text"}` and `{type:"input_image", image_url}` parts.
#[derive(Debug, Clone, Copy)]
pub struct ResponsesContentCodec {
    pub images: ImageConstraints,
}

impl Default for ResponsesContentCodec {
    fn default() -> Self {
        Self {
            images: RESPONSES_IMAGES,
        }
    }
}

impl ContentCodec for ResponsesContentCodec {
    fn encode(&self, content: &MessageContent) -> Converted<Vec<Value>> {
        let mut warnings = Vec::new();
        let mut parts = Vec::new();
        for block in content.blocks() {
            if let Err(w) = self.images.check_block(&block) {
                warnings.push(w);
                continue;
            }
            parts.push(match &block {
                ContentBlock::Text { text } => json!({"type": "input_text", "text": text}),
                ContentBlock::Image { .. } => json!({
                    "type": "input_image",
                    "image_url": block.image_as_url().unwrap_or_default(),
                }),
            });
        }
        Converted::with_warnings(parts, warnings)
    }

    fn decode(&self, blocks: &[Value]) -> String {
        blocks
            .iter()
            .filter(|b| {
                matches!(
                    b.get("type").and_then(Value::as_str),
                    Some("output_text" | "text" | "input_text")
                )
            })
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("")
    }

    fn validate(&self, blocks: &[Value]) -> Vec<String> {
        let mut errors = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            match block.get("type").and_then(Value::as_str) {
                Some("input_text" | "output_text") => {
                    if !block.get("text").is_some_and(Value::is_string) {
                        errors.push(format!("content[{i}] text part without text"));
                    }
                }
                Some("input_image") => {
                    let Some(url) = block.get("image_url").and_then(Value::as_str) else {
                        errors.push(format!("content[{i}] input_image without image_url"));
                        continue;
                    };
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
                Some("input_file" | "refusal") => {}
                Some(other) => errors.push(format!("content[{i}] has unsupported type '{other}'")),
                None => errors.push(format!("content[{i}] has no type")),
            }
        }
        errors
    }
}

/// Assistant history as `output_text` parts; images cannot be replayed.
pub(crate) fn encode_output_text(
    content: &MessageContent,
    warnings: &mut Vec<Warning>,
) -> Vec<Value> {
    if content.has_images() {
        warnings.push(
            Warning::content_violation("assistant messages cannot carry images, image dropped")
                .logged(),
        );
    }
    let text = content.text();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![json!({"type": "output_text", "text": text})]
    }
}
