use std::collections::HashMap;

use serde_json::{Map, Value, json};

use super::content::{GeminiContentCodec, is_thought};
use super::streaming::GeminiStreamReconstructor;
use super::tools::{GeminiToolCodec, encode_function_call};
use super::validation::GeminiValidator;
use crate::codecs::{ContentCodec, ToolCodec};
use crate::config::ProviderSettings;
use crate::error::{
    LlmError, UpstreamError, Warning, classify_vendor_error, taxonomy::GEMINI_ERRORS,
};
use crate::providers::{ProviderConverter, ProviderKind, ResponseParts, system_texts};
use crate::streaming::StreamSession;
use crate::types::usage::counter;
use crate::types::{
    ChatParams, Converted, FinishReason, Message, MessageKind, Usage, param_keys as keys,
};
use crate::validation::{RequestValidator, ResponseValidator};

/// `reasoning_effort` → `thinkingConfig.thinkingBudget`.
pub const THINKING_BUDGETS: &[(&str, u64)] =
    &[("none", 0), ("low", 1024), ("medium", 8192), ("high", 24576)];

/// Parameters renamed into `generationConfig`.
const GENERATION_FIELDS: &[(&str, &str)] = &[
    (keys::TEMPERATURE, "temperature"),
    (keys::TOP_P, "topP"),
    (keys::TOP_K, "topK"),
    (keys::N, "candidateCount"),
    (keys::PRESENCE_PENALTY, "presencePenalty"),
    (keys::FREQUENCY_PENALTY, "frequencyPenalty"),
    (keys::SEED, "seed"),
];

/// Gemma models reject `systemInstruction`.
pub fn supports_system_instruction(model: &str) -> bool {
    !model.trim_start_matches("models/").starts_with("gemma-")
}

pub(crate) fn parse_usage(usage: &Value) -> Option<Usage> {
    if !usage.is_object() {
        return None;
    }
    let prompt = counter(usage.get("promptTokenCount")).unwrap_or(0);
    let completion = counter(usage.get("candidatesTokenCount")).unwrap_or(0);
    let reasoning = counter(usage.get("thoughtsTokenCount"));
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: counter(usage.get("totalTokenCount"))
            .unwrap_or(prompt + completion + reasoning.unwrap_or(0)),
        reasoning_tokens: reasoning,
        cached_tokens: counter(usage.get("cachedContentTokenCount")),
    })
}

/// Gemini reports `STOP` even when the turn ends in function calls.
pub(crate) fn finish_reason(raw: &str, has_tool_calls: bool) -> FinishReason {
    match FinishReason::from_vendor(raw) {
        FinishReason::Stop if has_tool_calls => FinishReason::ToolCalls,
        reason => reason,
    }
}

/// Encoded conversation: `systemInstruction` (when supported) and `contents`.
#[derive(Debug, Clone, Default)]
pub struct GeminiConversation {
    pub system_instruction: Option<Value>,
    pub contents: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct GeminiConverter {
    validator: GeminiValidator,
    content: GeminiContentCodec,
    tools: GeminiToolCodec,
}

impl Default for GeminiConverter {
    fn default() -> Self {
        Self::new(ProviderSettings::default())
    }
}

impl GeminiConverter {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            validator: GeminiValidator::new(settings),
            content: GeminiContentCodec::default(),
            tools: GeminiToolCodec,
        }
    }

    fn settings(&self) -> &ProviderSettings {
        &self.validator.settings
    }

    /// Build `contents`. With `system_instruction` false the system text is folded into
    /// the leading user turn instead.
    pub fn encode_conversation(
        &self,
        messages: &[Message],
        system_instruction: bool,
    ) -> Converted<GeminiConversation> {
        let mut warnings = Vec::new();
        let system = system_texts(messages);
        let mut call_names: HashMap<&str, &str> = HashMap::new();
        let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();

        for message in messages {
            let (role, parts) = match &message.kind {
                MessageKind::System => continue,
                MessageKind::Human => (
                    "user",
                    self.content.encode(&message.content).drain_into(&mut warnings),
                ),
                MessageKind::Ai { tool_calls } => {
                    if message.content.has_images() {
                        warnings.push(
                            Warning::content_violation(
                                "model turns cannot carry images, image dropped",
                            )
                            .logged(),
                        );
                    }
                    let text = message.text();
                    let mut parts = Vec::new();
                    if !text.is_empty() {
                        parts.push(json!({"text": text}));
                    }
                    for call in tool_calls {
                        call_names.insert(call.id.as_str(), call.function_name.as_str());
                        parts.push(encode_function_call(call));
                    }
                    ("model", parts)
                }
                MessageKind::Tool { tool_call_id } => {
                    let name = match call_names.get(tool_call_id.as_str()) {
                        Some(name) => (*name).to_string(),
                        None => {
                            let fallback =
                                message.name.clone().unwrap_or_else(|| tool_call_id.clone());
                            warnings.push(
                                Warning::degraded(format!(
                                    "no preceding call for tool result {tool_call_id}, \
                                     using '{fallback}' as function name"
                                ))
                                .logged(),
                            );
                            fallback
                        }
                    };
                    let text = message.text();
                    let response = match serde_json::from_str::<Value>(&text) {
                        Ok(Value::Object(obj)) => Value::Object(obj),
                        _ => json!({"content": text}),
                    };
                    (
                        "function",
                        vec![json!({"function_response": {"name": name, "response": response}})],
                    )
                }
            };
            if parts.is_empty() {
                warnings.push(Warning::degraded(format!("empty {role} turn skipped")).logged());
                continue;
            }
            match turns.last_mut() {
                Some((last_role, last_parts)) if *last_role == role => last_parts.extend(parts),
                _ => turns.push((role, parts)),
            }
        }

        let mut conversation = GeminiConversation::default();
        if !system.is_empty() {
            if system_instruction {
                let parts: Vec<Value> = system.iter().map(|text| json!({"text": text})).collect();
                conversation.system_instruction = Some(json!({"parts": parts}));
            } else {
                tracing::debug!("folding system text into the first user turn");
                let folded = json!({"text": system.join("\n\n")});
                match turns.first_mut() {
                    Some(("user", parts)) => parts.insert(0, folded),
                    _ => turns.insert(0, ("user", vec![folded])),
                }
            }
        }
        conversation.contents = turns
            .into_iter()
            .map(|(role, parts)| json!({"role": role, "parts": parts}))
            .collect();
        Converted::with_warnings(conversation, warnings)
    }

    fn thinking_budget(&self, params: &ChatParams, warnings: &mut Vec<Warning>) -> Option<u64> {
        if let Some(budget) = params.u64(keys::THINKING_BUDGET) {
            return Some(budget);
        }
        let effort = params.str(keys::REASONING_EFFORT)?;
        let budget = self.settings().reasoning_budget(effort, THINKING_BUDGETS);
        if budget.is_none() {
            warnings.push(
                Warning::degraded(format!("no thinking budget for reasoning_effort '{effort}'"))
                    .logged(),
            );
        }
        budget
    }

    fn generation_config(
        &self,
        params: &ChatParams,
        warnings: &mut Vec<Warning>,
    ) -> Map<String, Value> {
        let mut config = Map::new();
        for (key, field) in GENERATION_FIELDS {
            if let Some(value) = params.get(key) {
                config.insert((*field).into(), value.clone());
            }
        }
        let max_tokens = params.u64(keys::MAX_TOKENS).or(self.settings().default_max_tokens);
        if let Some(max_tokens) = max_tokens {
            config.insert("maxOutputTokens".into(), json!(max_tokens));
        }
        let stop = params.stop_sequences();
        if !stop.is_empty() {
            config.insert("stopSequences".into(), json!(stop));
        }
        if let Some(format) = params.get(keys::RESPONSE_FORMAT) {
            match format.get("type").and_then(Value::as_str) {
                Some("json_object") => {
                    config.insert("responseMimeType".into(), json!("application/json"));
                }
                Some("json_schema") => {
                    config.insert("responseMimeType".into(), json!("application/json"));
                    if let Some(schema) = format.get("json_schema").and_then(|s| s.get("schema")) {
                        config.insert("responseSchema".into(), schema.clone());
                    }
                }
                Some("text") => {}
                other => warnings.push(
                    Warning::degraded(format!(
                        "response_format {other:?} is not supported by gemini, dropped"
                    ))
                    .logged(),
                ),
            }
        }
        if let Some(budget) = self.thinking_budget(params, warnings) {
            config.insert("thinkingConfig".into(), json!({"thinkingBudget": budget}));
        }
        config
    }
}

impl ProviderConverter for GeminiConverter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
        let conversation = self
            .encode_conversation(messages, supports_system_instruction(model))
            .drain_into(&mut warnings);

        let mut body = Map::new();
        body.insert("contents".into(), Value::Array(conversation.contents));
        if let Some(system) = conversation.system_instruction {
            body.insert("systemInstruction".into(), system);
        }
        let config = self.generation_config(params, &mut warnings);
        if !config.is_empty() {
            body.insert("generationConfig".into(), Value::Object(config));
        }

        let tools = params.tools();
        if !tools.is_empty() {
            body.insert(keys::TOOLS.into(), self.tools.encode_tools(&tools));
            if let Some(choice) = params
                .tool_choice()
                .and_then(|c| self.tools.encode_tool_choice(&c))
            {
                body.insert("toolConfig".into(), choice);
            }
        }

        if params.contains(keys::USER) {
            warnings.push(Warning::degraded("user is not supported by gemini, dropped").logged());
        }

        // The model and streaming mode are part of the endpoint URL, not the body.
        tracing::debug!(
            model,
            stream = params.is_stream(),
            messages = messages.len(),
            "built gemini request"
        );
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
        parts.usage = response.get("usageMetadata").and_then(parse_usage);
        parts.model = response.get("modelVersion").and_then(Value::as_str).map(str::to_string);
        parts.response_id = response.get("responseId").and_then(Value::as_str).map(str::to_string);

        let Some(candidate) = response.get("candidates").and_then(|c| c.get(0)) else {
            let Some(reason) = response
                .get("promptFeedback")
                .and_then(|f| f.get("blockReason"))
                .and_then(Value::as_str)
            else {
                return Err(LlmError::Format("gemini response has no candidates".into()));
            };
            parts.warnings.push(Warning::degraded(format!("prompt blocked: {reason}")).logged());
            parts.finish_reason = Some(FinishReason::ContentFilter);
            return Ok(parts.into_message(self.name()));
        };

        let blocks = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        parts.check_blocks(&self.content, blocks);
        parts.text = self.content.decode(blocks);
        parts.reasoning = blocks
            .iter()
            .filter(|p| is_thought(p))
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");
        parts.tool_calls = self.tools.decode_tool_calls(response).drain_into(&mut parts.warnings);
        parts.finish_reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .map(|raw| finish_reason(raw, !parts.tool_calls.is_empty()));

        Ok(parts.into_message(self.name()))
    }

    fn start_stream(&self) -> StreamSession {
        StreamSession::new(Box::new(GeminiStreamReconstructor))
    }

    /// `{systemInstruction?, contents}`.
    fn encode_messages(&self, messages: &[Message]) -> Converted<Value> {
        self.encode_conversation(messages, true).map(|conversation| {
            let mut out = Map::new();
            if let Some(system) = conversation.system_instruction {
                out.insert("systemInstruction".into(), system);
            }
            out.insert("contents".into(), Value::Array(conversation.contents));
            Value::Object(out)
        })
    }

    fn map_error(&self, payload: &Value) -> Option<UpstreamError> {
        classify_vendor_error(self.name(), GEMINI_ERRORS, payload)
    }
}
