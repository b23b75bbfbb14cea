//! Gemini `streamGenerateContent?alt=sse` reconstruction
//!
//! Every chunk is a partial `GenerateContentResponse`: candidate parts carry text
//! fragments, whole `functionCall`s or `thought` parts, and the last chunk adds the
//! `finishReason` and `usageMetadata`.

use serde::Deserialize;
use serde_json::Value;

use super::content::is_thought;
use super::converter::{finish_reason, parse_usage};
use super::tools::decode_function_call;
use crate::error::{LlmError, Warning, classify_vendor_error, taxonomy::GEMINI_ERRORS};
use crate::streaming::{StreamAccumulator, StreamReconstructor};
use crate::types::FinishReason;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiStreamCandidate>,
    usage_metadata: Option<Value>,
    model_version: Option<String>,
    response_id: Option<String>,
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamCandidate {
    #[serde(default)]
    index: usize,
    content: Option<GeminiStreamContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiStreamContent {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiStreamReconstructor;

impl StreamReconstructor for GeminiStreamReconstructor {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn apply_event(&self, acc: &mut StreamAccumulator, event: &Value) -> Result<(), LlmError> {
        if event.get("error").is_some() {
            return Err(classify_vendor_error("gemini", GEMINI_ERRORS, event)
                .map(LlmError::UpstreamApi)
                .unwrap_or_else(|| {
                    LlmError::Format(format!("unclassifiable error chunk: {event}"))
                }));
        }
        let chunk = match serde_json::from_value::<GeminiStreamChunk>(event.clone()) {
            Ok(chunk) => chunk,
            Err(e) => {
                acc.warn(Warning::UnparseableStreamEvent {
                    raw: event.to_string(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        if let Some(model) = &chunk.model_version {
            acc.set_model(model);
        }
        if let Some(id) = &chunk.response_id {
            acc.set_response_id(id);
        }
        if let Some(feedback) = chunk.prompt_feedback.as_ref()
            && let Some(reason) = feedback.get("blockReason").and_then(Value::as_str)
        {
            acc.warn(Warning::degraded(format!("prompt blocked: {reason}")));
            acc.set_finish_reason(FinishReason::ContentFilter);
        }

        for candidate in chunk.candidates {
            if candidate.index != 0 {
                tracing::debug!(index = candidate.index, "skipping non-primary gemini candidate");
                continue;
            }
            for part in candidate.content.unwrap_or_default().parts {
                let mut warnings = Vec::new();
                if let Some(call) = decode_function_call(&part, &mut warnings) {
                    let index = acc.tool_call_count();
                    acc.complete_tool_call(
                        index,
                        Some(&call.id),
                        &call.function_name,
                        call.arguments,
                    );
                } else if let Some(text) = part.get("text").and_then(Value::as_str) {
                    if is_thought(&part) {
                        acc.append_reasoning(text);
                    } else {
                        acc.append_text(text);
                    }
                }
                for warning in warnings {
                    acc.warn(warning);
                }
            }
            if let Some(reason) = &candidate.finish_reason {
                acc.set_finish_reason(finish_reason(reason, acc.tool_call_count() > 0));
                acc.close();
            }
        }

        if let Some(usage) = chunk.usage_metadata.as_ref().and_then(parse_usage) {
            acc.merge_usage(&usage);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::streaming::StreamSession;
    use serde_json::json;

    fn session() -> StreamSession {
        StreamSession::new(Box::new(GeminiStreamReconstructor))
    }

    #[test]
    fn merges_text_chunks() {
        let mut s = session();
        s.push_all([
            json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}}],
                "modelVersion": "gemini-2.0-flash"
            }),
            json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "lo"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 4,
                    "candidatesTokenCount": 2,
                    "totalTokenCount": 6
                }
            }),
        ])
        .unwrap();
        let message = s.finish().unwrap();
        assert_eq!(message.text(), "Hello");
        assert_eq!(message.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(message.usage().unwrap().total_tokens, 6);
        assert_eq!(message.model(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn function_calls_and_thoughts() {
        let mut s = session();
        s.push_all([
            json!({
                "candidates": [{"content": {"parts": [{"text": "need weather", "thought": true}]}}]
            }),
            json!({"candidates": [{"content": {"parts": [
                {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}},
                {"functionCall": {"name": "get_time", "args": {"tz": "CET"}}}
            ]}, "finishReason": "STOP"}]}),
        ])
        .unwrap();
        let message = s.finish().unwrap();
        assert_eq!(message.reasoning(), Some("need weather"));
        assert_eq!(message.tool_calls().len(), 2);
        assert_eq!(message.tool_calls()[1].function_name, "get_time");
        assert_eq!(message.finish_reason(), Some(FinishReason::ToolCalls));
    }

    #[test]
    fn error_chunk() {
        let err = session()
            .push(json!({
                "error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "quota"}
            }))
            .unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::RateLimited));
    }

    #[test]
    fn raw_sse_lines() {
        let mut s = session();
        s.push(concat!(
            r#"data: {"candidates": [{"content": {"parts": [{"text": "Hi"}]}, "#,
            r#""finishReason": "MAX_TOKENS"}]}"#
        ))
        .unwrap();
        let message = s.finish().unwrap();
        assert_eq!(message.text(), "Hi");
        assert_eq!(message.finish_reason(), Some(FinishReason::Length));
    }
}
