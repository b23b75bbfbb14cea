use serde_json::{Map, Value, json};

use super::content::AnthropicContentCodec;
use super::streaming::AnthropicStreamReconstructor;
use super::tools::{AnthropicToolCodec, encode_tool_use};
use super::validation::AnthropicValidator;
use crate::codecs::{ContentCodec, ToolCodec};
use crate::config::ProviderSettings;
use crate::error::{
    LlmError, UpstreamError, Warning, classify_vendor_error, taxonomy::ANTHROPIC_ERRORS,
};
use crate::providers::{ProviderConverter, ProviderKind, ResponseParts, system_texts};
use crate::streaming::StreamSession;
use crate::types::usage::counter;
use crate::types::{
    ChatParams, Converted, FinishReason, Message, MessageKind, ToolChoice, Usage,
    param_keys as keys,
};
use crate::validation::{RequestValidator, ResponseValidator};

/// `max_tokens` is mandatory on this API.
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

/// `reasoning_effort` → `thinking.budget_tokens`.
pub const THINKING_BUDGETS: &[(&str, u64)] = &[("low", 1024), ("medium", 4096), ("high", 16384)];

pub(crate) fn parse_usage(usage: &Value) -> Option<Usage> {
    if !usage.is_object() {
        return None;
    }
    let prompt = counter(usage.get("input_tokens")).unwrap_or(0);
    let completion = counter(usage.get("output_tokens")).unwrap_or(0);
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
        reasoning_tokens: None,
        cached_tokens: counter(usage.get("cache_read_input_tokens")),
    })
}

/// Encoded conversation: the lifted system prompt and the alternating turns.
#[derive(Debug, Clone, Default)]
pub struct AnthropicConversation {
    pub system: Option<String>,
    pub messages: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct AnthropicConverter {
    validator: AnthropicValidator,
    content: AnthropicContentCodec,
    tools: AnthropicToolCodec,
}

impl Default for AnthropicConverter {
    fn default() -> Self {
        Self::new(ProviderSettings::default())
    }
}

impl AnthropicConverter {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            validator: AnthropicValidator::new(settings),
            content: AnthropicContentCodec::default(),
            tools: AnthropicToolCodec,
        }
    }

    fn settings(&self) -> &ProviderSettings {
        &self.validator.settings
    }

    /// System messages are lifted into one prompt joined by blank lines; tool results
    /// become `tool_result` blocks in a user turn; consecutive same-role turns merge.
    pub fn encode_conversation(&self, messages: &[Message]) -> Converted<AnthropicConversation> {
        let mut warnings = Vec::new();
        let system = system_texts(messages);
        let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();

        for message in messages {
            let (role, blocks) = match &message.kind {
                MessageKind::System => continue,
                MessageKind::Human => (
                    "user",
                    self.content.encode(&message.content).drain_into(&mut warnings),
                ),
                MessageKind::Ai { tool_calls } => {
                    if message.content.has_images() {
                        warnings.push(
                            Warning::content_violation(
                                "assistant messages cannot carry images, image dropped",
                            )
                            .logged(),
                        );
                    }
                    let text = message.text();
                    let mut blocks = Vec::new();
                    if !text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                    blocks.extend(tool_calls.iter().map(encode_tool_use));
                    ("assistant", blocks)
                }
                MessageKind::Tool { tool_call_id } => (
                    "user",
                    vec![json!({
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": message.text(),
                    })],
                ),
            };
            if blocks.is_empty() {
                warnings.push(Warning::degraded(format!("empty {role} turn skipped")).logged());
                continue;
            }
            match turns.last_mut() {
                Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
                _ => turns.push((role, blocks)),
            }
        }

        let messages = turns
            .into_iter()
            .map(|(role, content)| json!({"role": role, "content": content}))
            .collect();
        Converted::with_warnings(
            AnthropicConversation {
                system: (!system.is_empty()).then(|| system.join("\n\n")),
                messages,
            },
            warnings,
        )
    }

    fn thinking_budget(&self, params: &ChatParams, warnings: &mut Vec<Warning>) -> Option<u64> {
        if let Some(budget) = params.u64(keys::THINKING_BUDGET) {
            return Some(budget);
        }
        let effort = params.str(keys::REASONING_EFFORT)?;
        let budget = self.settings().reasoning_budget(effort, THINKING_BUDGETS);
        // "none" asks for no thinking, which is what an absent budget means here.
        if budget.is_none() && !effort.eq_ignore_ascii_case("none") {
            warnings.push(
                Warning::degraded(format!(
                    "no thinking budget for reasoning_effort '{effort}', thinking disabled"
                ))
                .logged(),
            );
        }
        budget
    }
}

impl ProviderConverter for AnthropicConverter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
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
        let conversation = self.encode_conversation(messages).drain_into(&mut warnings);
        let mut max_tokens = params
            .u64(keys::MAX_TOKENS)
            .or(self.settings().default_max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let mut body = Map::new();
        body.insert(keys::MODEL.into(), json!(model));
        if let Some(system) = conversation.system {
            body.insert("system".into(), json!(system));
        }
        body.insert("messages".into(), Value::Array(conversation.messages));

        for key in [keys::TEMPERATURE, keys::TOP_P, keys::TOP_K] {
            if let Some(value) = params.get(key) {
                body.insert(key.into(), value.clone());
            }
        }
        let stop = params.stop_sequences();
        if !stop.is_empty() {
            body.insert("stop_sequences".into(), json!(stop));
        }
        if let Some(user) = params.str(keys::USER) {
            body.insert("metadata".into(), json!({"user_id": user}));
        }

        if let Some(budget) = self.thinking_budget(params, &mut warnings) {
            if max_tokens <= budget {
                let raised = budget + DEFAULT_MAX_TOKENS;
                tracing::debug!(
                    max_tokens,
                    budget,
                    raised,
                    "raising max_tokens above thinking budget"
                );
                max_tokens = raised;
            }
            body.insert("thinking".into(), json!({"type": "enabled", "budget_tokens": budget}));
            if params.f64(keys::TEMPERATURE).is_some_and(|t| t != 1.0) {
                body.remove(keys::TEMPERATURE);
                warnings.push(
                    Warning::degraded("temperature dropped: extended thinking requires the default")
                        .logged(),
                );
            }
        }
        body.insert(keys::MAX_TOKENS.into(), json!(max_tokens));

        let tools = params.tools();
        let choice = params.tool_choice();
        if !tools.is_empty() {
            if choice == Some(ToolChoice::None) {
                tracing::debug!("tool_choice none: tools removed from anthropic request");
            } else {
                body.insert(keys::TOOLS.into(), self.tools.encode_tools(&tools));
                if let Some(choice) = choice.and_then(|c| self.tools.encode_tool_choice(&c)) {
                    body.insert(keys::TOOL_CHOICE.into(), choice);
                }
            }
        }

        for unsupported in [
            keys::PRESENCE_PENALTY,
            keys::FREQUENCY_PENALTY,
            keys::SEED,
            keys::RESPONSE_FORMAT,
            keys::N,
        ] {
            if params.contains(unsupported) {
                warnings.push(
                    Warning::degraded(format!(
                        "{unsupported} is not supported by anthropic, dropped"
                    ))
                    .logged(),
                );
            }
        }

        if params.is_stream() {
            body.insert(keys::STREAM.into(), json!(true));
        }

        tracing::debug!(model, messages = messages.len(), "built anthropic request");
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
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Format("anthropic response has no content array".into()))?;

        parts.check_blocks(&self.content, blocks);
        parts.text = self.content.decode(blocks);
        parts.reasoning = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("thinking"))
            .filter_map(|b| b.get("thinking").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");
        parts.tool_calls = self.tools.decode_tool_calls(response).drain_into(&mut parts.warnings);
        parts.finish_reason = response
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(FinishReason::from_vendor);
        parts.usage = response.get("usage").and_then(parse_usage);
        parts.model = response.get("model").and_then(Value::as_str).map(str::to_string);
        parts.response_id = response.get("id").and_then(Value::as_str).map(str::to_string);

        Ok(parts.into_message(self.name()))
    }

    fn start_stream(&self) -> StreamSession {
        StreamSession::new(Box::new(AnthropicStreamReconstructor))
    }

    /// `{system?, messages}`.
    fn encode_messages(&self, messages: &[Message]) -> Converted<Value> {
        self.encode_conversation(messages).map(|conversation| {
            let mut out = Map::new();
            if let Some(system) = conversation.system {
                out.insert("system".into(), json!(system));
            }
            out.insert("messages".into(), Value::Array(conversation.messages));
            Value::Object(out)
        })
    }

    fn map_error(&self, payload: &Value) -> Option<UpstreamError> {
        classify_vendor_error(self.name(), ANTHROPIC_ERRORS, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::types::{ToolCall, ToolDefinition};

    fn params() -> ChatParams {
        ChatParams::new("claude-3-5-sonnet-latest")
    }

    #[test]
    fn system_lifted_and_turns_merged() {
        let messages = vec![
            Message::system("You are terse."),
            Message::human("one"),
            Message::system("Answer in French."),
            Message::human("two"),
        ];
        let body = AnthropicConverter::default()
            .convert_request(&messages, &params())
            .unwrap()
            .value;
        assert_eq!(body["system"], "You are terse.\n\nAnswer in French.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["content"][1]["text"], "two");
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn tool_results_are_user_blocks() {
        let messages = vec![
            Message::human("weather?"),
            Message::ai_with_tool_calls("", vec![ToolCall::new("toolu_1", "get_weather", json!({
                "city": "Paris"
            }))]),
            Message::tool("toolu_1", "sunny"),
        ];
        let body = AnthropicConverter::default()
            .convert_request(&messages, &params())
            .unwrap()
            .value;
        let turns = body["messages"].as_array().unwrap();
        assert_eq!(turns[1]["content"][0]["type"], "tool_use");
        assert_eq!(turns[1]["content"][0]["input"]["city"], "Paris");
        assert_eq!(turns[2]["role"], "user");
        assert_eq!(
            turns[2]["content"][0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "sunny"})
        );
    }

    #[test]
    fn tool_choice_none_removes_tools() {
        let p = params()
            .with_tools(&[ToolDefinition::without_parameters("now", "time")])
            .with_tool_choice(&ToolChoice::None);
        let body = AnthropicConverter::default()
            .convert_request(&[Message::human("hi")], &p)
            .unwrap()
            .value;
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn reasoning_effort_maps_to_thinking_budget() {
        let p = params().with_reasoning_effort("high").with_max_tokens(2000);
        let body = AnthropicConverter::default()
            .convert_request(&[Message::human("hi")], &p)
            .unwrap()
            .value;
        assert_eq!(body["thinking"]["budget_tokens"], 16384);
        assert!(body["max_tokens"].as_u64().unwrap() > 16384);

        let p = params().with_reasoning_effort("low").with_thinking_budget(3000);
        let body = AnthropicConverter::default()
            .convert_request(&[Message::human("hi")], &p)
            .unwrap()
            .value;
        assert_eq!(body["thinking"]["budget_tokens"], 3000);
    }

    #[test]
    fn unmapped_reasoning_effort_warns() {
        let converter = AnthropicConverter::default();
        let minimal = converter
            .convert_request(&[Message::human("hi")], &params().with_reasoning_effort("minimal"))
            .unwrap();
        assert!(minimal.value.get("thinking").is_none());
        assert!(matches!(
            &minimal.warnings[..],
            [Warning::Degraded { detail }] if detail.contains("minimal")
        ));

        let none = converter
            .convert_request(&[Message::human("hi")], &params().with_reasoning_effort("none"))
            .unwrap();
        assert!(none.value.get("thinking").is_none());
        assert!(none.is_clean());
    }

    #[test]
    fn parses_response_with_thinking_and_tools() {
        let response = json!({
            "id": "msg_1", "type": "message", "role": "assistant", "model": "claude-3-7-sonnet",
            "content": [
                {"type": "thinking", "thinking": "user wants weather", "signature": "s"},
                {"type": "text", "text": "Checking."},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": "get_weather",
                    "input": {"city": "Paris"}
                }
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 20, "output_tokens": 10}
        });
        let message = AnthropicConverter::default().convert_response(&response).unwrap();
        assert_eq!(message.text(), "Checking.");
        assert_eq!(message.reasoning(), Some("user wants weather"));
        assert_eq!(message.tool_calls().len(), 1);
        assert_eq!(message.finish_reason(), Some(FinishReason::ToolCalls));
        assert_eq!(message.usage().unwrap().total_tokens, 30);
        assert!(message.warnings().is_empty());
    }

    #[test]
    fn malformed_response_blocks_become_warnings() {
        let response = json!({
            "type": "message", "role": "assistant", "model": "claude-3-5-haiku",
            "content": [
                {"type": "text", "text": "Partial."},
                {"text": "untyped"},
                {
                    "type": "image",
                    "source": {"type": "base64", "media_type": "image/bmp", "data": "AAAA"}
                }
            ],
            "stop_reason": "end_turn"
        });
        let message = AnthropicConverter::default().convert_response(&response).unwrap();
        assert_eq!(message.text(), "Partial.");
        let warnings = message.warnings();
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(warnings[0].contains("content[1] has no type"));
        assert!(warnings[1].contains("image/bmp"));
    }

    #[test]
    fn rate_limit_error_payload() {
        let payload = json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "slow down"}
        });
        let err = AnthropicConverter::default().convert_response(&payload).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::RateLimited));
        assert!(err.to_string().contains("slow down"));
    }
}
