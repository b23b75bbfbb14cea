//! SSE framing
//!
//! Line-level parsing used by [`StreamSession::push`](super::StreamSession::push), and an
//! async driver that feeds a session from a byte stream using `eventsource-stream`,
//! which handles UTF-8 boundaries and line buffering.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;

use super::StreamSession;
use crate::error::LlmError;
use crate::types::Message;

/// Meaning of one SSE line or `data` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SseData {
    Event(Value),
    /// The `[DONE]` sentinel.
    Done,
    /// Blank lines, comments, and `event:`/`id:`/`retry:` fields.
    Ignored,
    Invalid { raw: String, reason: String },
}

/// Parse one raw line. Lines without a field name are treated as bare JSON payloads,
/// which covers newline-delimited JSON streams.
pub fn parse_line(line: &str) -> SseData {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return SseData::Ignored;
    }
    if let Some(data) = line.strip_prefix("data:") {
        return parse_data(data);
    }
    if ["event:", "id:", "retry:"].iter().any(|f| line.starts_with(f)) {
        return SseData::Ignored;
    }
    parse_data(line)
}

/// Parse a chunk of SSE text holding one or more lines.
///
/// Consecutive `data:` lines form one payload joined with `\n`, dispatched at a blank
/// line or at the end of the chunk. When the joined payload is not JSON, each line is
/// parsed on its own instead.
pub fn parse_frame(text: &str) -> Vec<SseData> {
    let mut out = Vec::new();
    let mut pending = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush_data(&mut pending, &mut out);
        } else if let Some(data) = line.strip_prefix("data:") {
            pending.push(data.trim());
        } else {
            match parse_line(line) {
                SseData::Ignored => {}
                other => {
                    flush_data(&mut pending, &mut out);
                    out.push(other);
                }
            }
        }
    }
    flush_data(&mut pending, &mut out);
    out
}

fn flush_data(pending: &mut Vec<&str>, out: &mut Vec<SseData>) {
    match pending.as_slice() {
        [] => return,
        [single] => out.push(parse_data(single)),
        lines => match parse_data(&lines.join("\n")) {
            SseData::Invalid { .. } => out.extend(lines.iter().map(|line| parse_data(line))),
            joined => out.push(joined),
        },
    }
    pending.clear();
}

/// Parse the payload of a `data:` field.
pub fn parse_data(data: &str) -> SseData {
    let data = data.trim();
    if data.is_empty() {
        return SseData::Ignored;
    }
    if data == "[DONE]" {
        return SseData::Done;
    }
    match serde_json::from_str(data) {
        Ok(value) => SseData::Event(value),
        Err(e) => SseData::Invalid {
            raw: data.to_string(),
            reason: e.to_string(),
        },
    }
}

/// Drive `session` from an SSE byte stream and finalize it when the stream ends.
///
/// Transport errors abort with [`LlmError::Stream`]; malformed payloads are only warned
/// about.
pub async fn reconstruct<S, B, E>(mut session: StreamSession, bytes: S) -> Result<Message, LlmError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut events = std::pin::pin!(bytes.eventsource());
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| LlmError::Stream(format!("SSE parsing error: {e}")))?;
        session.push_data(parse_data(&event.data))?;
    }
    session.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn line_kinds() {
        assert_eq!(parse_line("data: [DONE]"), SseData::Done);
        assert_eq!(parse_line("event: message_start"), SseData::Ignored);
        assert_eq!(parse_line(": ping"), SseData::Ignored);
        assert_eq!(parse_line("   "), SseData::Ignored);
        assert_eq!(parse_line("data:{\"a\":1}"), SseData::Event(json!({"a": 1})));
        assert_eq!(parse_line("{\"a\":2}"), SseData::Event(json!({"a": 2})));
        assert!(matches!(parse_line("data: {oops"), SseData::Invalid { .. }));
    }

    #[test]
    fn multi_line_data_is_joined() {
        let frame = "event: message\ndata: {\"a\":\ndata: 1}\n\ndata: [DONE]\n";
        assert_eq!(
            parse_frame(frame),
            vec![SseData::Event(json!({"a": 1})), SseData::Done]
        );
    }

    #[test]
    fn adjacent_events_without_blank_line_still_parse() {
        let frame = "data: {\"a\":1}\ndata: {\"b\":2}";
        assert_eq!(
            parse_frame(frame),
            vec![SseData::Event(json!({"a": 1})), SseData::Event(json!({"b": 2}))]
        );
        assert_eq!(
            parse_frame(": ping\n{\"c\":3}\n"),
            vec![SseData::Event(json!({"c": 3}))]
        );
    }
}
