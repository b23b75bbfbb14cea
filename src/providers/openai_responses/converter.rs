use serde_json::{Map, Value, json};

use super::content::{ResponsesContentCodec, encode_output_text};
use super::streaming::ResponsesStreamReconstructor;
use super::tools::{ResponsesToolCodec, encode_function_call_item};
use super::validation::ResponsesValidator;
use crate::codecs::{ContentCodec, ToolCodec, text_of};
use crate::config::ProviderSettings;
use crate::error::{
    LlmError, UpstreamError, Warning, classify_vendor_error, taxonomy::RESPONSES_ERRORS,
};
use crate::providers::openai::converter::parse_usage;
use crate::providers::openai::is_reasoning_model;
use crate::providers::openai::streaming::extract_thinking;
use crate::providers::{ProviderConverter, ProviderKind, ResponseParts};
use crate::streaming::StreamSession;
use crate::types::{
    ChatParams, Converted, FinishReason, Message, MessageContent, MessageKind, param_keys as keys,
};
use crate::validation::{RequestValidator, ResponseValidator};

/// Finish reason from a response `status`, `None` while still in progress.
pub(crate) fn status_finish_reason(response: &Value, has_tool_calls: bool) -> Option<FinishReason> {
    match response.get("status").and_then(Value::as_str)? {
        "completed" if has_tool_calls => Some(FinishReason::ToolCalls),
        "completed" => Some(FinishReason::Stop),
        "incomplete" => Some(
            response
                .get("incomplete_details")
                .and_then(|d| d.get("reason"))
                .and_then(Value::as_str)
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Length),
        ),
        "failed" | "cancelled" => Some(FinishReason::Error),
        _ => None,
    }
}

/// `reasoning` given as a string, `{summary:[{text}]}` or `{content}`.
fn reasoning_text(reasoning: &Value) -> String {
    match reasoning {
        Value::String(text) => text.clone(),
        Value::Object(obj) => obj
            .get("summary")
            .map(text_of)
            .filter(|s| !s.is_empty())
            .or_else(|| obj.get("content").map(text_of))
            .unwrap_or_default(),
        other => text_of(other),
    }
}

/// `response_format` → `text.format`.
fn text_format(format: &Value) -> Option<Value> {
    match format.get("type").and_then(Value::as_str)? {
        "json_schema" => {
            let schema = format.get("json_schema").unwrap_or(&Value::Null);
            let mut out = Map::new();
            out.insert("type".into(), json!("json_schema"));
            for key in ["name", "schema", "strict", "description"] {
                if let Some(value) = schema.get(key) {
                    out.insert(key.into(), value.clone());
                }
            }
            Some(Value::Object(out))
        }
        kind @ ("json_object" | "text") => Some(json!({"type": kind})),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiResponsesConverter {
    validator: ResponsesValidator,
    content: ResponsesContentCodec,
    tools: ResponsesToolCodec,
}

impl Default for OpenAiResponsesConverter {
    fn default() -> Self {
        Self::new(ProviderSettings::default())
    }
}

impl OpenAiResponsesConverter {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            validator: ResponsesValidator::new(settings),
            content: ResponsesContentCodec::default(),
            tools: ResponsesToolCodec,
        }
    }

    fn settings(&self) -> &ProviderSettings {
        &self.validator.settings
    }

    /// `input` as item list; `system_role` is `system` or `developer`.
    fn encode_items(&self, messages: &[Message], system_role: &str) -> Converted<Vec<Value>> {
        let mut warnings = Vec::new();
        let mut items = Vec::new();
        for message in messages {
            match &message.kind {
                MessageKind::System => {
                    items.push(json!({"role": system_role, "content": message.text()}));
                }
                MessageKind::Human => {
                    let parts = self.content.encode(&message.content).drain_into(&mut warnings);
                    items.push(json!({"role": "user", "content": parts}));
                }
                MessageKind::Ai { tool_calls } => {
                    let parts = encode_output_text(&message.content, &mut warnings);
                    if !parts.is_empty() {
                        items.push(json!({"role": "assistant", "content": parts}));
                    }
                    items.extend(tool_calls.iter().map(encode_function_call_item));
                }
                MessageKind::Tool { tool_call_id } => {
                    items.push(json!({
                        "type": "function_call_output",
                        "call_id": tool_call_id,
                        "output": message.text(),
                    }));
                }
            }
        }
        Converted::with_warnings(items, warnings)
    }

    /// A single plain-text human message collapses to `input: "<text>"`.
    fn encode_input(&self, messages: &[Message], system_role: &str) -> Converted<Value> {
        if let [message] = messages
            && message.is_human()
            && let MessageContent::Text(text) = &message.content
        {
            return Converted::new(json!(text));
        }
        self.encode_items(messages, system_role).map(Value::Array)
    }

    fn parse_chat_shape(
        &self,
        response: &Value,
        parts: &mut ResponseParts,
    ) -> Result<(), LlmError> {
        let choice = response
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::Format("responses payload has empty choices".into()))?;
        let message = choice.get("message").unwrap_or(&Value::Null);
        parts.text = text_of(message.get("content").unwrap_or(&Value::Null));
        parts.reasoning = response
            .get("reasoning")
            .map(reasoning_text)
            .filter(|s| !s.is_empty())
            .or_else(|| extract_thinking(message).map(str::to_string))
            .unwrap_or_default();
        parts.tool_calls = self.tools.decode_tool_calls(response).drain_into(&mut parts.warnings);
        parts.finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(FinishReason::from_vendor);
        Ok(())
    }

    fn parse_output_shape(&self, response: &Value, items: &[Value], parts: &mut ResponseParts) {
        let mut text = Vec::new();
        let mut reasoning = Vec::new();
        for item in items {
            match item.get("type").and_then(Value::as_str) {
                Some("message") => {
                    let content = item.get("content").and_then(Value::as_array).map(Vec::as_slice);
                    parts.check_blocks(&self.content, content.unwrap_or_default());
                    let decoded = self.content.decode(content.unwrap_or_default());
                    if decoded.is_empty()
                        && let Some(refusal) = content
                            .unwrap_or_default()
                            .iter()
                            .find_map(|c| c.get("refusal").and_then(Value::as_str))
                    {
                        text.push(refusal.to_string());
                        parts.finish_reason = Some(FinishReason::ContentFilter);
                    } else {
                        text.push(decoded);
                    }
                }
                Some("reasoning") => reasoning.push(reasoning_text(item)),
                _ => {}
            }
        }
        parts.text = text.join("");
        parts.reasoning = reasoning.join("");
        parts.tool_calls = self.tools.decode_tool_calls(response).drain_into(&mut parts.warnings);
        if parts.finish_reason.is_none() {
            parts.finish_reason = status_finish_reason(response, !parts.tool_calls.is_empty());
        }
    }
}

impl ProviderConverter for OpenAiResponsesConverter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiResponses
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
        let system_role = if is_reasoning_model(model) { "developer" } else { "system" };
        let mut body = Map::new();
        body.insert(keys::MODEL.into(), json!(model));
        let input = self.encode_input(messages, system_role).drain_into(&mut warnings);
        body.insert("input".into(), input);

        for key in [
            keys::TEMPERATURE,
            keys::TOP_P,
            keys::USER,
            keys::PREVIOUS_RESPONSE_ID,
            keys::METADATA,
        ] {
            if let Some(value) = params.get(key) {
                body.insert(key.into(), value.clone());
            }
        }
        let max_tokens = params.u64(keys::MAX_TOKENS).or(self.settings().default_max_tokens);
        if let Some(max_tokens) = max_tokens {
            body.insert("max_output_tokens".into(), json!(max_tokens));
        }
        if let Some(effort) = params.str(keys::REASONING_EFFORT) {
            body.insert("reasoning".into(), json!({"effort": effort}));
        }
        if let Some(format) = params.get(keys::RESPONSE_FORMAT) {
            match text_format(format) {
                Some(format) => {
                    body.insert("text".into(), json!({"format": format}));
                }
                None => warnings
                    .push(Warning::degraded("unrecognised response_format dropped").logged()),
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

        for unsupported in [
            keys::STOP,
            keys::N,
            keys::PRESENCE_PENALTY,
            keys::FREQUENCY_PENALTY,
            keys::SEED,
            keys::TOP_K,
            keys::THINKING_BUDGET,
        ] {
            if params.contains(unsupported) {
                warnings.push(
                    Warning::degraded(format!(
                        "{unsupported} is not supported by the responses api, dropped"
                    ))
                    .logged(),
                );
            }
        }

        if params.is_stream() {
            body.insert(keys::STREAM.into(), json!(true));
        }

        tracing::debug!(model, messages = messages.len(), "built responses request");
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

        if response.get("choices").is_some() {
            self.parse_chat_shape(response, &mut parts)?;
        } else if let Some(items) = response.get("output").and_then(Value::as_array) {
            self.parse_output_shape(response, items, &mut parts);
        } else {
            return Err(LlmError::Format("responses payload has neither choices nor output".into()));
        }

        parts.usage = response.get("usage").and_then(parse_usage);
        parts.model = response.get("model").and_then(Value::as_str).map(str::to_string);
        parts.response_id = response.get("id").and_then(Value::as_str).map(str::to_string);
        Ok(parts.into_message(self.name()))
    }

    fn start_stream(&self) -> StreamSession {
        StreamSession::new(Box::new(ResponsesStreamReconstructor))
    }

    /// Always the item-list form.
    fn encode_messages(&self, messages: &[Message]) -> Converted<Value> {
        self.encode_items(messages, "system").map(Value::Array)
    }

    fn map_error(&self, payload: &Value) -> Option<UpstreamError> {
        classify_vendor_error(self.name(), RESPONSES_ERRORS, payload)
    }
}
