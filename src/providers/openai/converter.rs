use serde_json::{Map, Value, json};

use super::content::{OpenAiContentCodec, text_only};
use super::streaming::{OpenAiStreamReconstructor, extract_thinking};
use super::tools::{OpenAiToolCodec, decode_message_tool_calls, encode_tool_calls};
use super::validation::OpenAiValidator;
use crate::codecs::{ContentCodec, ToolCodec, text_of};
use crate::config::ProviderSettings;
use crate::error::{
    LlmError, UpstreamError, Warning, classify_vendor_error, taxonomy::OPENAI_ERRORS,
};
use crate::providers::{ProviderConverter, ProviderKind, ResponseParts};
use crate::streaming::StreamSession;
use crate::types::usage::counter;
use crate::types::{
    ChatParams, Converted, FinishReason, Message, MessageContent, MessageKind, Usage,
    param_keys as keys,
};
use crate::validation::{RequestValidator, ResponseValidator};

/// Parameters copied verbatim into the request body.
const PASSTHROUGH: &[&str] = &[
    keys::TEMPERATURE,
    keys::TOP_P,
    keys::N,
    keys::STOP,
    keys::PRESENCE_PENALTY,
    keys::FREQUENCY_PENALTY,
    keys::SEED,
    keys::USER,
    keys::RESPONSE_FORMAT,
];

/// `o1`, `o3` and `o4` models take `developer` messages and `max_completion_tokens`.
pub fn is_reasoning_model(model: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|p| model.starts_with(p))
}

/// OpenAI usage block; also accepts the Responses spelling (`input_tokens`/`output_tokens`).
pub(crate) fn parse_usage(usage: &Value) -> Option<Usage> {
    if !usage.is_object() {
        return None;
    }
    let prompt = counter(usage.get("prompt_tokens").or_else(|| usage.get("input_tokens")))
        .unwrap_or(0);
    let completion = counter(
        usage
            .get("completion_tokens")
            .or_else(|| usage.get("output_tokens")),
    )
    .unwrap_or(0);
    let total = counter(usage.get("total_tokens")).unwrap_or(prompt + completion);
    let details = |outer: &str, alt: &str, field: &str| {
        counter(
            usage
                .get(outer)
                .or_else(|| usage.get(alt))
                .and_then(|d| d.get(field)),
        )
    };
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total,
        reasoning_tokens: details(
            "completion_tokens_details",
            "output_tokens_details",
            "reasoning_tokens",
        ),
        cached_tokens: details("prompt_tokens_details", "input_tokens_details", "cached_tokens"),
    })
}

#[derive(Debug, Clone)]
pub struct OpenAiConverter {
    validator: OpenAiValidator,
    content: OpenAiContentCodec,
    tools: OpenAiToolCodec,
}

impl Default for OpenAiConverter {
    fn default() -> Self {
        Self::new(ProviderSettings::default())
    }
}

impl OpenAiConverter {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            validator: OpenAiValidator::new(settings),
            content: OpenAiContentCodec::default(),
            tools: OpenAiToolCodec,
        }
    }

    fn settings(&self) -> &ProviderSettings {
        &self.validator.settings
    }

    /// Encode one message; `system_role` is `system` or `developer`.
    fn encode_message(
        &self,
        message: &Message,
        system_role: &str,
        warnings: &mut Vec<Warning>,
    ) -> Value {
        let mut out = Map::new();
        match &message.kind {
            MessageKind::System => {
                out.insert("role".into(), json!(system_role));
                out.insert(
                    "content".into(),
                    json!(text_only(&message.content, "system", warnings)),
                );
            }
            MessageKind::Human => {
                out.insert("role".into(), json!("user"));
                let content = match &message.content {
                    MessageContent::Text(text) => json!(text),
                    blocks => Value::Array(self.content.encode(blocks).drain_into(warnings)),
                };
                out.insert("content".into(), content);
            }
            MessageKind::Ai { tool_calls } => {
                out.insert("role".into(), json!("assistant"));
                let text = text_only(&message.content, "assistant", warnings);
                let content = if text.is_empty() && !tool_calls.is_empty() {
                    Value::Null
                } else {
                    json!(text)
                };
                out.insert("content".into(), content);
                if !tool_calls.is_empty() {
                    out.insert("tool_calls".into(), encode_tool_calls(tool_calls));
                }
            }
            MessageKind::Tool { tool_call_id } => {
                out.insert("role".into(), json!("tool"));
                out.insert("tool_call_id".into(), json!(tool_call_id));
                out.insert("content".into(), json!(text_only(&message.content, "tool", warnings)));
            }
        }
        if let Some(name) = &message.name
            && !message.is_tool()
        {
            out.insert("name".into(), json!(name));
        }
        Value::Object(out)
    }

    fn encode_conversation(&self, messages: &[Message], reasoning: bool) -> Converted<Value> {
        let system_role = if reasoning { "developer" } else { "system" };
        let mut warnings = Vec::new();
        let encoded = messages
            .iter()
            .map(|m| self.encode_message(m, system_role, &mut warnings))
            .collect();
        Converted::with_warnings(Value::Array(encoded), warnings)
    }
}

impl ProviderConverter for OpenAiConverter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn convert_request(
        &self,
        messages: &[Message],
        params: &ChatParams,
    ) -> Result<Converted<Value>, LlmError> {
        let mut warnings = self
            .validator
            .validate_request(messages, params)
            .into_request_result(self.name())?;

        let model = params.model().unwrap_or_default();
        let reasoning = is_reasoning_model(model);
        let mut body = Map::new();
        body.insert(keys::MODEL.into(), json!(model));
        body.insert(
            "messages".into(),
            self.encode_conversation(messages, reasoning).drain_into(&mut warnings),
        );

        for key in PASSTHROUGH {
            if let Some(value) = params.get(key) {
                body.insert((*key).into(), value.clone());
            }
        }

        let max_tokens = params
            .get(keys::MAX_TOKENS)
            .cloned()
            .or_else(|| self.settings().default_max_tokens.map(Value::from));
        if let Some(max_tokens) = max_tokens {
            let field = if reasoning { "max_completion_tokens" } else { keys::MAX_TOKENS };
            body.insert(field.into(), max_tokens);
        }

        if let Some(effort) = params.str(keys::REASONING_EFFORT) {
            if reasoning {
                body.insert(keys::REASONING_EFFORT.into(), json!(effort));
            } else {
                warnings.push(
                    Warning::degraded(format!(
                        "reasoning_effort ignored for non-reasoning model {model}"
                    ))
                    .logged(),
                );
            }
        }
        for unsupported in [keys::TOP_K, keys::THINKING_BUDGET] {
            if params.contains(unsupported) {
                warnings.push(
                    Warning::degraded(format!("{unsupported} is not supported by openai, dropped"))
                        .logged(),
                );
            }
        }

        let tools = params.tools();
        if !tools.is_empty() {
            body.insert(keys::TOOLS.into(), self.tools.encode_tools(&tools));
            if let Some(choice) = params
                .tool_choice()
                .and_then(|c| self.tools.encode_tool_choice(&c))
            {
                body.insert(keys::TOOL_CHOICE.into(), choice);
            }
        }

        if params.is_stream() {
            body.insert(keys::STREAM.into(), json!(true));
            body.insert("stream_options".into(), json!({"include_usage": true}));
        }

        tracing::debug!(model, messages = messages.len(), "built openai request");
        Ok(Converted::with_warnings(Value::Object(body), warnings))
    }

    fn convert_response(&self, response: &Value) -> Result<Message, LlmError> {
        if let Some(err) = self.map_error(response) {
            return Err(err.into());
        }
        let mut parts = ResponseParts {
            warnings: self.validator.validate_response(response).into_warnings(),
            ..Default::default()
        };

        let choice = response
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::Format("openai response has no choices".into()))?;
        let message = choice.get("message").unwrap_or(&Value::Null);

        if let Some(blocks) = message.get("content").and_then(Value::as_array) {
            parts.check_blocks(&self.content, blocks);
        }
        parts.text = text_of(message.get("content").unwrap_or(&Value::Null));
        if parts.text.is_empty()
            && let Some(refusal) = message.get("refusal").and_then(Value::as_str)
        {
            parts.text = refusal.to_string();
            parts.finish_reason = Some(FinishReason::ContentFilter);
        }
        parts.tool_calls = decode_message_tool_calls(message).drain_into(&mut parts.warnings);
        parts.reasoning = extract_thinking(message).unwrap_or_default().to_string();
        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            parts.finish_reason = Some(FinishReason::from_vendor(reason));
        }
        parts.usage = response.get("usage").and_then(parse_usage);
        parts.model = response.get("model").and_then(Value::as_str).map(str::to_string);
        parts.response_id = response.get("id").and_then(Value::as_str).map(str::to_string);

        Ok(parts.into_message(self.name()))
    }

    fn start_stream(&self) -> StreamSession {
        StreamSession::new(Box::new(OpenAiStreamReconstructor))
    }

    fn encode_messages(&self, messages: &[Message]) -> Converted<Value> {
        self.encode_conversation(messages, false)
    }

    fn map_error(&self, payload: &Value) -> Option<UpstreamError> {
        classify_vendor_error(self.name(), OPENAI_ERRORS, payload)
    }
}
