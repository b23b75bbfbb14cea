//! Anthropic messages stream reconstruction
//!
//! Event order: `message_start`, then per content block `content_block_start`,
//! `content_block_delta`* and `content_block_stop`, then `message_delta` carrying the
//! stop reason and output usage, and finally `message_stop`. `ping` may appear anywhere.

use serde::Deserialize;
use serde_json::Value;

use super::converter::parse_usage;
use crate::error::{LlmError, Warning, classify_vendor_error, taxonomy::ANTHROPIC_ERRORS};
use crate::streaming::{StreamAccumulator, StreamReconstructor};
use crate::types::FinishReason;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicStartMessage,
    },
    ContentBlockStart {
        index: usize,
        content_block: AnthropicContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: AnthropicDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: AnthropicMessageDelta,
        usage: Option<Value>,
    },
    MessageStop,
    Ping,
    Error {
        error: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct AnthropicStartMessage {
    id: Option<String>,
    model: Option<String>,
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta,
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicMessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicStreamReconstructor;

impl StreamReconstructor for AnthropicStreamReconstructor {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    fn apply_event(&self, acc: &mut StreamAccumulator, event: &Value) -> Result<(), LlmError> {
        let parsed = match serde_json::from_value::<AnthropicStreamEvent>(event.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                acc.warn(Warning::UnparseableStreamEvent {
                    raw: event.to_string(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        match parsed {
            AnthropicStreamEvent::MessageStart { message } => {
                if let Some(id) = &message.id {
                    acc.set_response_id(id);
                }
                if let Some(model) = &message.model {
                    acc.set_model(model);
                }
                if let Some(usage) = message.usage.as_ref().and_then(parse_usage) {
                    acc.merge_usage(&usage);
                }
            }
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                AnthropicContentBlock::Text { text } => acc.append_block_text(index, &text),
                AnthropicContentBlock::ToolUse { id, name } => {
                    acc.tool_call_delta(index, Some(&id), Some(&name), None)
                }
                AnthropicContentBlock::Thinking { thinking } => acc.append_reasoning(&thinking),
                AnthropicContentBlock::Other => {
                    tracing::debug!(index, "ignoring unsupported content block");
                }
            },
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicDelta::TextDelta { text } => acc.append_block_text(index, &text),
                AnthropicDelta::InputJsonDelta { partial_json } => {
                    acc.tool_call_delta(index, None, None, Some(&partial_json))
                }
                AnthropicDelta::ThinkingDelta { thinking } => acc.append_reasoning(&thinking),
                AnthropicDelta::SignatureDelta | AnthropicDelta::Other => {}
            },
            AnthropicStreamEvent::ContentBlockStop { index } => acc.close_tool_call(index),
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = &delta.stop_reason {
                    acc.set_finish_reason(FinishReason::from_vendor(reason));
                }
                if let Some(usage) = usage.as_ref().and_then(parse_usage) {
                    acc.merge_usage(&usage);
                }
            }
            AnthropicStreamEvent::MessageStop => acc.close(),
            AnthropicStreamEvent::Ping => {}
            AnthropicStreamEvent::Error { error } => {
                return Err(classify_vendor_error("anthropic", ANTHROPIC_ERRORS, event)
                    .map(LlmError::UpstreamApi)
                    .unwrap_or_else(|| {
                        LlmError::Format(format!("unclassifiable error event: {error}"))
                    }));
            }
            AnthropicStreamEvent::Unknown => {
                tracing::debug!("ignoring unknown anthropic stream event");
            }
        }
        Ok(())
    }
}
