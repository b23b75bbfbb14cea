//! End-to-end conversions through the public facade

use llm_wire::AdapterConfig;
use llm_wire::prelude::*;
use serde_json::json;

/// Tiny valid base64 payload; only the declared media type matters here.
const PIXEL: &str = "iVBORw0KGgo=";

#[test]
fn hello_world_request_for_every_provider() {
    let adapter = Adapter::builtin();
    let messages = [Message::system("Be brief."), Message::human("Hello")];
    let cases = [
        ("openai", "gpt-4o-mini"),
        ("anthropic", "claude-3-5-haiku-20241022"),
        ("gemini", "gemini-2.0-flash"),
        ("openai_responses", "gpt-4.1-mini"),
    ];
    for (provider, model) in cases {
        let converted = adapter
            .converter(provider)
            .unwrap()
            .convert_request(&messages, &ChatParams::new(model).with_temperature(0.3))
            .unwrap();
        assert!(converted.is_clean(), "{provider}: {:?}", converted.warnings);
        let body = converted.value;
        let rendered = body.to_string();
        assert!(rendered.contains("Be brief."), "{provider}");
        assert!(rendered.contains("Hello"), "{provider}");
    }

    let openai = adapter
        .converter("openai")
        .unwrap()
        .convert_request(&messages, &ChatParams::new("gpt-4o-mini").with_temperature(0.3))
        .unwrap()
        .value;
    assert_eq!(
        openai["messages"],
        json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "Hello"}
        ])
    );
    assert_eq!(openai["temperature"], 0.3);
}

#[test]
fn out_of_range_temperature_is_rejected_before_encoding() {
    let adapter = Adapter::builtin();
    let err = adapter
        .converter("openai")
        .unwrap()
        .convert_request(
            &[Message::human("hi")],
            &ChatParams::new("gpt-4o").with_temperature(5.0),
        )
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.validation_errors().iter().any(|e| e.contains("temperature")));
    assert!(err.to_string().contains("openai"));
}

#[test]
fn unsupported_image_format_is_dropped_with_warning() {
    let adapter = Adapter::builtin();
    let message = Message::human(vec![
        ContentBlock::text("What is in this picture?"),
        ContentBlock::image_base64("image/bmp", PIXEL),
    ]);
    let converted = adapter
        .converter("anthropic")
        .unwrap()
        .convert_request(&[message], &ChatParams::new("claude-3-5-sonnet-20241022"))
        .unwrap();
    let content = converted.value["messages"][0]["content"].as_array().unwrap().clone();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0]["type"], "text");
    assert!(matches!(
        &converted.warnings[..],
        [Warning::ContentConstraintViolation { reason }] if reason.contains("image/bmp")
    ));
}

#[test]
fn vendor_rate_limit_is_classified() {
    let adapter = Adapter::builtin();
    let payload = json!({
        "type": "error",
        "error": {"type": "rate_limit_error", "message": "slow down"}
    });
    let err = adapter.to_canonical(payload.clone(), Some("anthropic")).unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::RateLimited));
    let LlmError::UpstreamApi(upstream) = err else {
        panic!("expected an upstream error");
    };
    assert_eq!(upstream.message, "slow down");
    assert_eq!(upstream.vendor_type.as_deref(), Some("rate_limit_error"));

    // Without a hint the error envelope is still recognised.
    let sniffed = adapter.to_canonical(payload, None).unwrap_err();
    assert_eq!(sniffed.category(), Some(ErrorCategory::RateLimited));

    let bare = json!({"error": {"type": "rate_limit_error", "message": "slow down"}});
    for provider in ["openai", "anthropic", "openai_responses"] {
        let upstream = adapter.converter(provider).unwrap().map_error(&bare).unwrap();
        assert_eq!(upstream.category, ErrorCategory::RateLimited, "{provider}");
        assert!(upstream.describe().contains("slow down"), "{provider}");
    }
    let sniffed = adapter.to_canonical(bare, None).unwrap_err();
    assert!(sniffed.to_string().contains("slow down"));
}

#[test]
fn malformed_tool_arguments_become_empty_with_warning() {
    let adapter = Adapter::builtin();
    let response = json!({
        "id": "chatcmpl-7",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "lookup", "arguments": "{invalid"}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    });
    let message = adapter.to_canonical(response, None).unwrap();
    let calls = message.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function_name, "lookup");
    assert!(calls[0].arguments.is_empty());
    let warnings = message.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("lookup"));
    assert_eq!(message.finish_reason(), Some(FinishReason::ToolCalls));
}

#[test]
fn streamed_and_complete_responses_agree() {
    let adapter = Adapter::builtin();
    let openai = adapter.converter("openai").unwrap();
    let complete = openai
        .convert_response(&json!({
            "model": "gpt-4o",
            "choices": [
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hello, world"},
                    "finish_reason": "stop"
                }
            ],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        }))
        .unwrap();
    let streamed = openai
        .convert_stream_response(&[
            json!({
                "model": "gpt-4o",
                "choices": [{"index": 0, "delta": {"content": "Hello, "}}]
            }).into(),
            concat!(
                r#"data: {"choices": [{"index": 0, "delta": {"content": "world"}, "#,
                r#""finish_reason": "stop"}]}"#
            )
            .into(),
            json!({
                "choices": [],
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
            }).into(),
            "data: [DONE]".into(),
        ])
        .unwrap();
    assert_eq!(streamed.text(), complete.text());
    assert_eq!(streamed.finish_reason(), complete.finish_reason());
    assert_eq!(streamed.usage(), complete.usage());
    assert_eq!(streamed.model(), complete.model());
}

#[test]
fn conversation_round_trips_through_records_and_providers() {
    let adapter = Adapter::builtin();
    let conversation = vec![
        Message::system("You answer weather questions."),
        Message::human(vec![
            ContentBlock::text("Weather where this was taken?"),
            ContentBlock::image_base64("image/png", PIXEL),
        ])
        .with_name("alice"),
        Message::ai_with_tool_calls(
            "",
            vec![
                ToolCall::new("call_1", "get_weather", json!({"city": "Paris", "days": 2})),
                ToolCall::new("call_2", "get_time", json!({})),
            ],
        )
        .with_metadata("trace", json!({"step": 1})),
        Message::tool("call_1", "18C and sunny"),
        Message::tool("call_2", "14:05").with_name("get_time"),
        Message::ai("It is 18C and sunny."),
    ];

    let records = adapter.from_canonical_batch(&conversation, TargetFormat::Record).unwrap();
    assert!(records.is_clean());
    let restored = adapter
        .to_canonical_batch(records.value.as_array().unwrap().clone(), Some("record"))
        .unwrap();
    assert_eq!(restored.len(), conversation.len());
    for (before, after) in conversation.iter().zip(&restored) {
        assert_eq!(before.kind, after.kind);
        assert_eq!(before.content, after.content);
        assert_eq!(before.name, after.name);
        assert_eq!(before.metadata, after.metadata);
    }
    assert_eq!(restored[2].tool_calls()[0].arguments["days"], 2);
    assert_eq!(restored[4].tool_call_id(), Some("call_2"));

    let again = adapter.from_canonical_batch(&restored, TargetFormat::Record).unwrap();
    assert_eq!(again.value, records.value);

    for provider in ["openai", "anthropic", "gemini", "openai_responses"] {
        let converted = adapter
            .converter(provider)
            .unwrap()
            .encode_messages(&restored);
        assert!(converted.is_clean(), "{provider}: {:?}", converted.warnings);
        let rendered = converted.value.to_string();
        assert!(rendered.contains("get_weather"), "{provider}");
        assert!(rendered.contains("18C and sunny"), "{provider}");
    }
}

#[test]
fn repeated_tool_call_ids_in_a_response_are_made_unique() {
    let adapter = Adapter::builtin();
    let response = json!({
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "a", "arguments": "{}"}
                    },
                    {
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "b", "arguments": "{}"}
                    }
                ]
            },
            "finish_reason": "tool_calls"
        }]
    });
    let message = adapter.to_canonical(response, None).unwrap();
    let ids: Vec<String> = message.tool_calls().iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids[0], "call_1");
    assert_ne!(ids[1], "call_1");
    assert_eq!(message.warnings().len(), 1);
    assert!(message.warnings()[0].contains("duplicate tool call id call_1"));

    // The decoded message is valid history for the next request.
    let history = [
        Message::human("go"),
        message,
        Message::tool(ids[0].clone(), "first"),
        Message::tool(ids[1].clone(), "second"),
    ];
    let next = adapter
        .converter("openai")
        .unwrap()
        .convert_request(&history, &ChatParams::new("gpt-4o"));
    assert!(next.is_ok(), "{next:?}");
}

#[test]
fn configured_adapter_applies_provider_settings() {
    let config = AdapterConfig::from_value(json!({
        "anthropic": {"default_max_tokens": 1000},
        "gemini": {"allow_unknown_models": true}
    }))
    .unwrap();
    let adapter = Adapter::from_config(&config);
    let body = adapter
        .converter("claude")
        .unwrap()
        .convert_request(&[Message::human("hi")], &ChatParams::new("claude-3-opus-20240229"))
        .unwrap()
        .value;
    assert_eq!(body["max_tokens"], 1000);

    let converted = adapter
        .converter("gemini")
        .unwrap()
        .convert_request(&[Message::human("hi")], &ChatParams::new("my-tuned-model"))
        .unwrap();
    assert_eq!(converted.warnings.len(), 1);
}
