//! Provider converters
//!
//! One module per vendor family. Each composes a content codec, a tool codec, a request
//! and response validator, and a stream reconstructor behind [`ProviderConverter`].

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod openai_responses;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::codecs::ContentCodec;
use crate::error::{LlmError, UpstreamError, Warning};
use crate::streaming::{StreamInput, StreamSession};
use crate::types::{ChatParams, Converted, FinishReason, Message, ToolCall, Usage, metadata_keys};

pub use anthropic::AnthropicConverter;
pub use gemini::GeminiConverter;
pub use openai::OpenAiConverter;
pub use openai_responses::OpenAiResponsesConverter;

/// The supported vendor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    OpenAiResponses,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Gemini,
        Self::OpenAiResponses,
    ];

    /// Canonical registry name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::OpenAiResponses => "openai_responses",
        }
    }

    /// Alternative names accepted by the registry.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["chat", "openai_chat"],
            Self::Anthropic => &["claude"],
            Self::Gemini => &["google", "google_ai"],
            Self::OpenAiResponses => &["responses", "openai-responses"],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name || kind.aliases().contains(&name.as_str()))
            .ok_or_else(|| LlmError::UnknownProvider(s.to_string()))
    }
}

/// Request building, response parsing and stream reconstruction for one vendor.
pub trait ProviderConverter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Validate `params` and `messages`, then build the vendor request body.
    ///
    /// Validation failures return [`LlmError::Validation`] before anything is encoded.
    /// Dropped content is reported in the returned warnings.
    fn convert_request(
        &self,
        messages: &[Message],
        params: &ChatParams,
    ) -> Result<Converted<Value>, LlmError>;

    /// Parse a complete vendor response. Shape problems become warnings in
    /// `metadata.warnings`; vendor error envelopes become [`LlmError::UpstreamApi`].
    fn convert_response(&self, response: &Value) -> Result<Message, LlmError>;

    /// Begin an incremental stream.
    fn start_stream(&self) -> StreamSession;

    /// Reconstruct a whole recorded stream.
    fn convert_stream_response(&self, events: &[StreamInput]) -> Result<Message, LlmError> {
        let mut session = self.start_stream();
        session.push_all(events.iter().cloned())?;
        session.finish()
    }

    /// Encode a conversation fragment without parameters or validation.
    fn encode_messages(&self, messages: &[Message]) -> Converted<Value>;

    /// Classify a vendor error payload, if it is one.
    fn map_error(&self, payload: &Value) -> Option<UpstreamError>;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

static_assertions::assert_impl_all!(OpenAiConverter: Send, Sync);
static_assertions::assert_impl_all!(AnthropicConverter: Send, Sync);
static_assertions::assert_impl_all!(GeminiConverter: Send, Sync);
static_assertions::assert_impl_all!(OpenAiResponsesConverter: Send, Sync);

/// Pieces of a parsed response, assembled into a message by [`ResponseParts::into_message`].
#[derive(Debug, Default)]
pub(crate) struct ResponseParts {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub reasoning: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    pub model: Option<String>,
    pub response_id: Option<String>,
    pub warnings: Vec<Warning>,
}

impl ResponseParts {
    /// Record constraint problems in received wire blocks as shape warnings.
    pub fn check_blocks(&mut self, codec: &impl ContentCodec, blocks: &[Value]) {
        for problem in codec.validate(blocks) {
            self.warnings.push(Warning::response_shape(problem).logged());
        }
    }

    pub fn into_message(mut self, provider: &'static str) -> Message {
        let duplicates = ToolCall::dedup_ids(&mut self.tool_calls);
        self.warnings.extend(duplicates);
        let mut message = Message::ai_with_tool_calls(self.text, self.tool_calls);
        let metadata = &mut message.metadata;
        metadata.insert(metadata_keys::PROVIDER.into(), Value::from(provider));
        if let Some(model) = self.model {
            metadata.insert(metadata_keys::MODEL.into(), Value::from(model));
        }
        if let Some(id) = self.response_id {
            metadata.insert(metadata_keys::RESPONSE_ID.into(), Value::from(id));
        }
        if let Some(reason) = self.finish_reason
            && let Ok(value) = serde_json::to_value(reason)
        {
            metadata.insert(metadata_keys::FINISH_REASON.into(), value);
        }
        if let Some(usage) = self.usage
            && let Ok(value) = serde_json::to_value(usage)
        {
            metadata.insert(metadata_keys::USAGE.into(), value);
        }
        if !self.reasoning.is_empty() {
            metadata.insert(metadata_keys::REASONING.into(), Value::from(self.reasoning));
        }
        message.record_warnings(&self.warnings);
        message
    }
}

/// Stringify a non-object argument payload so it can go through the JSON-string path.
pub(crate) fn raw_arguments(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// System messages' text, in order.
pub(crate) fn system_texts(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.is_system())
        .map(Message::text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Reasoning effort names accepted on requests.
pub(crate) const REASONING_EFFORTS: &[&str] = &["none", "minimal", "low", "medium", "high"];
