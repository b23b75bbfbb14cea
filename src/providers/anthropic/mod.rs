//! Anthropic messages API
//!
//! Request: `{model, max_tokens, system?, messages:[{role, content:[blocks]}], tools?}`;
//! response: `{content:[blocks], stop_reason, usage}`; streaming: typed events from
//! `message_start` to `message_stop`.

pub mod content;
pub mod converter;
pub mod streaming;
pub mod tools;
pub mod validation;

pub use content::AnthropicContentCodec;
pub use converter::{
    AnthropicConversation, AnthropicConverter, DEFAULT_MAX_TOKENS, THINKING_BUDGETS,
};
pub use streaming::AnthropicStreamReconstructor;
pub use tools::AnthropicToolCodec;
pub use validation::{ANTHROPIC_MODEL_PREFIXES, AnthropicValidator};
