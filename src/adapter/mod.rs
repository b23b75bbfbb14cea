//! Dispatch facade
//!
//! [`Adapter`] routes between the canonical [`Message`] and the outside world: plain
//! records, vendor responses and vendor wire fragments. Vendor responses without a
//! provider hint are recognised by their top-level keys.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::config::AdapterConfig;
use crate::error::LlmError;
use crate::providers::{ProviderConverter, ProviderKind};
use crate::registry::ConverterRegistry;
use crate::types::{ChatRecord, Converted, Message, Metadata};

/// Anything that can be turned into a canonical message.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalInput {
    Message(Message),
    Record(ChatRecord),
    /// A record-shaped map or a complete vendor response.
    Map(Map<String, Value>),
    /// Plain text, read as a human message.
    Text(String),
}

impl From<Message> for CanonicalInput {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<ChatRecord> for CanonicalInput {
    fn from(record: ChatRecord) -> Self {
        Self::Record(record)
    }
}

impl From<Map<String, Value>> for CanonicalInput {
    fn from(map: Map<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl From<Value> for CanonicalInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(map),
            Value::String(text) => Self::Text(text),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&str> for CanonicalInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CanonicalInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Output shape for [`Adapter::from_canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// `{role, content, name?, tool_calls?, tool_call_id?, metadata?}`.
    Record,
    /// The provider's own message encoding.
    Provider(ProviderKind),
    /// Flat map with text content; anything unrecognised lands here.
    Generic,
}

impl FromStr for TargetFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Ok(match name.as_str() {
            "record" | "canonical" => Self::Record,
            _ => name
                .parse::<ProviderKind>()
                .map(Self::Provider)
                .unwrap_or(Self::Generic),
        })
    }
}

impl From<ProviderKind> for TargetFormat {
    fn from(kind: ProviderKind) -> Self {
        Self::Provider(kind)
    }
}

impl From<&str> for TargetFormat {
    fn from(name: &str) -> Self {
        match name.parse() {
            Ok(target) => target,
            Err(never) => match never {},
        }
    }
}

/// Guess the vendor of a complete response from its top-level keys.
pub fn detect_provider(map: &Map<String, Value>) -> Option<ProviderKind> {
    let type_is = |t: &str| map.get("type").and_then(Value::as_str) == Some(t);
    if map.contains_key("choices") {
        Some(ProviderKind::OpenAi)
    } else if map.contains_key("candidates") || map.contains_key("promptFeedback") {
        Some(ProviderKind::Gemini)
    } else if type_is("message")
        || (map.contains_key("stop_reason") && map.contains_key("content"))
    {
        Some(ProviderKind::Anthropic)
    } else if map.contains_key("output")
        || map.get("object").and_then(Value::as_str) == Some("response")
    {
        Some(ProviderKind::OpenAiResponses)
    } else if type_is("error") {
        Some(ProviderKind::Anthropic)
    } else if map.contains_key("error") && !map.contains_key("role") {
        Some(ProviderKind::OpenAi)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Adapter {
    registry: Arc<ConverterRegistry>,
}

impl Default for Adapter {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Adapter {
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self { registry }
    }

    pub fn builtin() -> Self {
        Self::new(Arc::new(ConverterRegistry::builtin()))
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::new(Arc::new(ConverterRegistry::from_config(config)))
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn converter(&self, name: &str) -> Result<Arc<dyn ProviderConverter>, LlmError> {
        self.registry.get(name)
    }

    /// Normalize one input.
    ///
    /// `provider_hint` names the vendor of a map input (`"record"` forces the record
    /// reading); without it the vendor is detected. Conversion warnings end up in the
    /// message's `metadata.warnings`.
    pub fn to_canonical(
        &self,
        input: impl Into<CanonicalInput>,
        provider_hint: Option<&str>,
    ) -> Result<Message, LlmError> {
        match input.into() {
            CanonicalInput::Message(message) => Ok(message),
            CanonicalInput::Text(text) => Ok(Message::human(text)),
            CanonicalInput::Record(record) => Ok(record_to_message(&record)),
            CanonicalInput::Map(map) => {
                let provider = match provider_hint {
                    Some(hint) if TargetFormat::from(hint) == TargetFormat::Record => None,
                    Some(hint) => Some(self.registry.get(hint)?),
                    None => detect_provider(&map)
                        .map(|kind| self.registry.get_kind(kind))
                        .transpose()?,
                };
                match provider {
                    Some(converter) => {
                        tracing::debug!(provider = converter.name(), "converting vendor response");
                        converter.convert_response(&Value::Object(map))
                    }
                    None => {
                        let (record, warnings) = ChatRecord::from_map(&map).into_parts();
                        let mut message = record_to_message(&record);
                        message.record_warnings(&warnings);
                        Ok(message)
                    }
                }
            }
        }
    }

    /// Normalize a batch; the first failure aborts.
    pub fn to_canonical_batch<I, T>(
        &self,
        inputs: I,
        provider_hint: Option<&str>,
    ) -> Result<Vec<Message>, LlmError>
    where
        I: IntoIterator<Item = T>,
        T: Into<CanonicalInput>,
    {
        inputs
            .into_iter()
            .map(|input| self.to_canonical(input, provider_hint))
            .collect()
    }

    /// Render one message in `target` format.
    pub fn from_canonical(
        &self,
        message: &Message,
        target: impl Into<TargetFormat>,
    ) -> Result<Converted<Value>, LlmError> {
        match target.into() {
            TargetFormat::Record => Ok(Converted::new(Value::Object(
                ChatRecord::from_message(message).to_map(),
            ))),
            TargetFormat::Generic => Ok(Converted::new(generic_map(message))),
            TargetFormat::Provider(kind) => {
                let converter = self.registry.get_kind(kind)?;
                Ok(converter.encode_messages(std::slice::from_ref(message)))
            }
        }
    }

    /// Render a conversation. Provider targets encode it as one fragment, so
    /// provider-level merging (system lifting, same-role turns) applies.
    pub fn from_canonical_batch(
        &self,
        messages: &[Message],
        target: impl Into<TargetFormat>,
    ) -> Result<Converted<Value>, LlmError> {
        match target.into() {
            TargetFormat::Provider(kind) => {
                Ok(self.registry.get_kind(kind)?.encode_messages(messages))
            }
            target => {
                let mut warnings = Vec::new();
                let mut items = Vec::with_capacity(messages.len());
                for message in messages {
                    items.push(self.from_canonical(message, target)?.drain_into(&mut warnings));
                }
                Ok(Converted::with_warnings(Value::Array(items), warnings))
            }
        }
    }
}

fn record_to_message(record: &ChatRecord) -> Message {
    let (mut message, warnings) = record.to_message().into_parts();
    message.record_warnings(&warnings);
    message
}

fn generic_map(message: &Message) -> Value {
    let mut out = Map::new();
    out.insert("role".into(), json!(message.role_name()));
    out.insert("content".into(), json!(message.text()));
    if let Some(name) = &message.name {
        out.insert("name".into(), json!(name));
    }
    if !message.tool_calls().is_empty() {
        let calls: Vec<Value> = message
            .tool_calls()
            .iter()
            .map(|call| {
                json!({"id": call.id, "name": call.function_name, "arguments": call.arguments})
            })
            .collect();
        out.insert("tool_calls".into(), Value::Array(calls));
    }
    if let Some(id) = message.tool_call_id() {
        out.insert("tool_call_id".into(), json!(id));
    }
    if !message.metadata.is_empty() {
        out.insert("metadata".into(), Value::Object(Metadata::clone(&message.metadata)));
    }
    Value::Object(out)
}
