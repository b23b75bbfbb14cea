//! Fixture utilities: load recorded SSE streams and replay them through a converter

use std::io;

use llm_wire::streaming::{StreamInput, sse};
use llm_wire::{LlmError, Message, ProviderConverter};

fn fixture_text(path: &str) -> io::Result<String> {
    // Normalize line endings
    Ok(std::fs::read_to_string(path)?.replace("\r\n", "\n"))
}

/// Split an `.sse` fixture into event frames (separated by blank lines), as a byte stream
/// would deliver them.
pub fn load_sse_fixture_as_bytes(path: &str) -> io::Result<Vec<Result<Vec<u8>, io::Error>>> {
    let raw = fixture_text(path)?;
    let mut out = Vec::new();
    for chunk in raw.split("\n\n") {
        let s = chunk.trim_end_matches('\n');
        if s.is_empty() {
            continue;
        }
        // Restore SSE event blank line terminator
        let mut owned = String::from(s);
        owned.push_str("\n\n");
        out.push(Ok(owned.into_bytes()));
    }
    Ok(out)
}

/// Every line of a fixture, for feeding a session synchronously.
pub fn load_sse_fixture_lines(path: &str) -> io::Result<Vec<String>> {
    Ok(fixture_text(path)?.lines().map(str::to_string).collect())
}

/// The fixture's payloads as separate inputs: parsed events, plus the `[DONE]` sentinel
/// as a raw line.
pub fn load_sse_fixture_inputs(path: &str) -> io::Result<Vec<StreamInput>> {
    Ok(sse::parse_frame(&fixture_text(path)?)
        .into_iter()
        .filter_map(|data| match data {
            sse::SseData::Event(event) => Some(StreamInput::Event(event)),
            sse::SseData::Done => Some(StreamInput::from("data: [DONE]")),
            _ => None,
        })
        .collect())
}

/// Replay a fixture through the async SSE bridge.
pub async fn replay_sse_fixture(
    converter: &dyn ProviderConverter,
    path: &str,
) -> Result<Message, LlmError> {
    let bytes = load_sse_fixture_as_bytes(path).expect("load fixture");
    sse::reconstruct(converter.start_stream(), futures::stream::iter(bytes)).await
}

/// Replay a whole fixture as one raw frame.
pub fn replay_frame(converter: &dyn ProviderConverter, path: &str) -> Result<Message, LlmError> {
    let mut session = converter.start_stream();
    session.push(fixture_text(path).expect("load fixture"))?;
    session.finish()
}

/// Replay parsed inputs in two batches split at `at`.
pub fn replay_split(
    converter: &dyn ProviderConverter,
    inputs: &[StreamInput],
    at: usize,
) -> Result<Message, LlmError> {
    let (head, tail) = inputs.split_at(at);
    let mut session = converter.start_stream();
    session.push_all(head.iter().cloned())?;
    session.push_all(tail.iter().cloned())?;
    session.finish()
}

/// Replay a fixture line by line through a synchronous session.
pub fn replay_lines(converter: &dyn ProviderConverter, path: &str) -> Result<Message, LlmError> {
    let mut session = converter.start_stream();
    session.push_all(load_sse_fixture_lines(path).expect("load fixture"))?;
    session.finish()
}
