//! Recorded vendor streams replayed through the SSE bridge and the synchronous session

use llm_wire::prelude::*;
use llm_wire::registry::ConverterRegistry;

mod support;

use support::assert_same_reconstruction;
use support::stream_fixture::{
    load_sse_fixture_inputs, replay_frame, replay_lines, replay_split, replay_sse_fixture,
};

const FIXTURES: &[(&str, &str)] = &[
    ("openai", "tests/fixtures/openai/hello_world.sse"),
    ("openai", "tests/fixtures/openai/tool_call_stream.sse"),
    ("anthropic", "tests/fixtures/anthropic/message_start_deltas_stop.sse"),
    ("anthropic", "tests/fixtures/anthropic/thinking_and_text.sse"),
    ("gemini", "tests/fixtures/gemini/function_call_stream.sse"),
    ("openai_responses", "tests/fixtures/openai_responses/text_stream.sse"),
];

fn converter(name: &str) -> std::sync::Arc<dyn ProviderConverter> {
    ConverterRegistry::builtin().get(name).expect("builtin provider")
}

#[tokio::test]
async fn openai_hello_world_fixture() {
    let message = replay_sse_fixture(
        &*converter("openai"),
        "tests/fixtures/openai/hello_world.sse",
    )
    .await
    .expect("stream ok");
    assert!(message.is_ai());
    assert_eq!(message.text(), "Hello, world");
    assert_eq!(message.finish_reason(), Some(FinishReason::Stop));
    assert_eq!(message.model(), Some("gpt-4o"));
    assert!(message.warnings().is_empty());
}

#[tokio::test]
async fn openai_tool_call_fixture() {
    let message = replay_sse_fixture(
        &*converter("openai"),
        "tests/fixtures/openai/tool_call_stream.sse",
    )
    .await
    .expect("stream ok");
    let calls = message.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_abc");
    assert_eq!(calls[0].function_name, "get_weather");
    assert_eq!(calls[0].arguments["city"], "Paris");
    assert_eq!(message.finish_reason(), Some(FinishReason::ToolCalls));
    assert_eq!(message.usage().expect("usage").total_tokens, 29);
}

#[tokio::test]
async fn anthropic_message_start_deltas_stop_fixture() {
    let message = replay_sse_fixture(
        &*converter("anthropic"),
        "tests/fixtures/anthropic/message_start_deltas_stop.sse",
    )
    .await
    .expect("stream ok");
    assert_eq!(message.text(), "Hello world");
    assert_eq!(message.finish_reason(), Some(FinishReason::Stop));
    let usage = message.usage().expect("usage");
    assert_eq!((usage.prompt_tokens, usage.completion_tokens), (10, 2));
    assert_eq!(usage.total_tokens, 12);
}

#[tokio::test]
async fn anthropic_thinking_and_text_fixture() {
    let message = replay_sse_fixture(
        &*converter("anthropic"),
        "tests/fixtures/anthropic/thinking_and_text.sse",
    )
    .await
    .expect("stream ok");
    assert_eq!(message.reasoning(), Some("Reasoning about the question."));
    assert_eq!(message.text(), "Answer: 42");
}

#[tokio::test]
async fn anthropic_error_event_fixture() {
    let err = replay_sse_fixture(
        &*converter("anthropic"),
        "tests/fixtures/anthropic/error_event.sse",
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::Overloaded));
    assert!(err.to_string().contains("Overloaded"));
}

#[tokio::test]
async fn gemini_function_call_fixture() {
    let message = replay_sse_fixture(
        &*converter("gemini"),
        "tests/fixtures/gemini/function_call_stream.sse",
    )
    .await
    .expect("stream ok");
    assert_eq!(message.text(), "Let me check the weather. ");
    assert_eq!(message.reasoning(), Some("Looking that up"));
    assert_eq!(message.tool_calls()[0].function_name, "get_weather");
    assert_eq!(message.tool_calls()[0].arguments["city"], "Tokyo");
    assert_eq!(message.finish_reason(), Some(FinishReason::ToolCalls));
    let usage = message.usage().expect("usage");
    assert_eq!(usage.total_tokens, 45);
    assert_eq!(usage.reasoning_tokens, Some(8));
}

#[tokio::test]
async fn responses_text_fixture() {
    let message = replay_sse_fixture(
        &*converter("openai_responses"),
        "tests/fixtures/openai_responses/text_stream.sse",
    )
    .await
    .expect("stream ok");
    assert_eq!(message.text(), "Hello there");
    assert_eq!(message.finish_reason(), Some(FinishReason::Stop));
    assert_eq!(message.model(), Some("gpt-4.1-mini"));
    assert_eq!(message.usage().expect("usage").total_tokens, 10);
}

#[test]
fn async_bridge_and_line_replay_agree() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    for (provider, path) in FIXTURES {
        let converter = converter(provider);
        let via_lines = replay_lines(&*converter, path).expect("lines ok");
        let via_bridge = runtime
            .block_on(replay_sse_fixture(&*converter, path))
            .expect("bridge ok");
        assert_same_reconstruction(&via_lines, &via_bridge, path);
    }
}

#[test]
fn split_pushes_match_a_single_batch() {
    for (provider, path) in FIXTURES {
        let converter = converter(provider);
        let inputs = load_sse_fixture_inputs(path).expect("load fixture");
        assert!(inputs.len() > 2, "{path}");
        let whole = converter.convert_stream_response(&inputs).expect("whole ok");
        for at in 1..inputs.len() {
            let split = replay_split(&*converter, &inputs, at).expect("split ok");
            assert_same_reconstruction(&whole, &split, &format!("{path} split at {at}"));
        }
    }
}

#[test]
fn one_raw_frame_matches_separate_events() {
    for (provider, path) in FIXTURES {
        let converter = converter(provider);
        let inputs = load_sse_fixture_inputs(path).expect("load fixture");
        let events = converter.convert_stream_response(&inputs).expect("events ok");
        let frame = replay_frame(&*converter, path).expect("frame ok");
        assert_same_reconstruction(&events, &frame, path);
    }
}

#[test]
fn vendor_tool_call_ids_survive_every_replay() {
    let converter = converter("openai");
    let path = "tests/fixtures/openai/tool_call_stream.sse";
    let inputs = load_sse_fixture_inputs(path).expect("load fixture");
    let ids = [
        converter.convert_stream_response(&inputs).expect("events ok"),
        replay_split(&*converter, &inputs, 2).expect("split ok"),
        replay_frame(&*converter, path).expect("frame ok"),
        replay_lines(&*converter, path).expect("lines ok"),
    ]
    .map(|message| message.tool_calls()[0].id.clone());
    assert!(ids.iter().all(|id| id == "call_abc"), "{ids:?}");
}
