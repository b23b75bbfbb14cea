//! Stream reconstruction
//!
//! A [`StreamSession`] pairs one provider's [`StreamReconstructor`] with a fresh
//! [`StreamAccumulator`]. Feed it events in arrival order, then call
//! [`StreamSession::finish`] once.

pub mod accumulator;
pub mod sse;

pub use accumulator::{StreamAccumulator, StreamState};

use serde_json::Value;

use crate::error::{LlmError, Warning};
use crate::types::Message;

/// One stream input: a parsed JSON event or a raw SSE line (or frame).
#[derive(Debug, Clone, PartialEq)]
pub enum StreamInput {
    Event(Value),
    Line(String),
}

impl From<Value> for StreamInput {
    fn from(value: Value) -> Self {
        Self::Event(value)
    }
}

impl From<String> for StreamInput {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<&str> for StreamInput {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

/// Provider-specific translation of vendor stream events into accumulator calls.
pub trait StreamReconstructor: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Apply one parsed event. Vendor error events return [`LlmError::UpstreamApi`].
    fn apply_event(&self, acc: &mut StreamAccumulator, event: &Value) -> Result<(), LlmError>;

    /// Turn the accumulated state into the final message.
    fn finish(&self, acc: &mut StreamAccumulator) -> Result<Message, LlmError> {
        acc.finalize()
    }
}

/// An in-progress stream for one provider.
pub struct StreamSession {
    reconstructor: Box<dyn StreamReconstructor>,
    accumulator: StreamAccumulator,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("provider", &self.reconstructor.provider())
            .field("state", &self.accumulator.state())
            .finish()
    }
}

impl StreamSession {
    pub fn new(reconstructor: Box<dyn StreamReconstructor>) -> Self {
        let accumulator = StreamAccumulator::new(reconstructor.provider());
        Self {
            reconstructor,
            accumulator,
        }
    }

    pub fn state(&self) -> StreamState {
        self.accumulator.state()
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    /// Apply one input.
    pub fn push(&mut self, input: impl Into<StreamInput>) -> Result<(), LlmError> {
        if self.accumulator.state() == StreamState::Finalized {
            return Err(LlmError::StreamFinalized);
        }
        match input.into() {
            StreamInput::Event(event) => self.apply(&event),
            StreamInput::Line(text) => sse::parse_frame(&text)
                .into_iter()
                .try_for_each(|data| self.push_data(data)),
        }
    }

    /// Apply an already-framed SSE payload.
    pub fn push_data(&mut self, data: sse::SseData) -> Result<(), LlmError> {
        if self.accumulator.state() == StreamState::Finalized {
            return Err(LlmError::StreamFinalized);
        }
        match data {
            sse::SseData::Event(event) => return self.apply(&event),
            sse::SseData::Done => self.accumulator.close(),
            sse::SseData::Ignored => {}
            sse::SseData::Invalid { raw, reason } => self
                .accumulator
                .warn(Warning::UnparseableStreamEvent { raw, reason }),
        }
        Ok(())
    }

    /// Apply a sequence of inputs in order, stopping at the first error.
    pub fn push_all<I>(&mut self, inputs: I) -> Result<(), LlmError>
    where
        I: IntoIterator,
        I::Item: Into<StreamInput>,
    {
        inputs.into_iter().try_for_each(|input| self.push(input))
    }

    /// Finalize the stream into a message. Fails on a second call.
    pub fn finish(&mut self) -> Result<Message, LlmError> {
        self.reconstructor.finish(&mut self.accumulator)
    }

    fn apply(&mut self, event: &Value) -> Result<(), LlmError> {
        let kind = event.get("type").and_then(Value::as_str).unwrap_or("-");
        tracing::debug!(provider = self.reconstructor.provider(), kind, "stream event");
        self.reconstructor.apply_event(&mut self.accumulator, event)
    }
}
