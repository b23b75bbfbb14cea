//! Stream accumulator
//!
//! One accumulator per logical stream. Provider reconstructors translate vendor events
//! into the calls below; the accumulator owns the buffers and the lifecycle:
//!
//! ```text
//! Open --delta--> Accumulating --terminal--> Closed --finalize--> Finalized
//!   \_____________________________________________finalize_______/
//! ```
//!
//! Content arriving after `Closed` is dropped with a warning. Usage, model and id
//! updates are still accepted there, because some vendors report usage after the
//! finish marker.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{LlmError, Warning};
use crate::types::{FinishReason, Message, ToolCall, Usage, metadata_keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Accumulating,
    Closed,
    Finalized,
}

#[derive(Debug, Clone, Default)]
struct ToolCallBuffer {
    id: Option<String>,
    name: String,
    arguments: String,
    parsed: Option<Map<String, Value>>,
    closed: bool,
}

#[derive(Debug, Clone)]
pub struct StreamAccumulator {
    provider: &'static str,
    state: StreamState,
    text: String,
    blocks: BTreeMap<usize, String>,
    tool_calls: BTreeMap<usize, ToolCallBuffer>,
    reasoning: String,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    model: Option<String>,
    response_id: Option<String>,
    extra: Map<String, Value>,
    warnings: Vec<Warning>,
}

impl StreamAccumulator {
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            state: StreamState::Open,
            text: String::new(),
            blocks: BTreeMap::new(),
            tool_calls: BTreeMap::new(),
            reasoning: String::new(),
            finish_reason: None,
            usage: None,
            model: None,
            response_id: None,
            extra: Map::new(),
            warnings: Vec::new(),
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, StreamState::Closed | StreamState::Finalized)
    }

    /// Text gathered so far, flat buffer first, then block buffers in index order.
    pub fn text(&self) -> String {
        let mut out = self.text.clone();
        for block in self.blocks.values() {
            out.push_str(block);
        }
        out
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Number of tool-call buffers opened so far.
    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.len()
    }

    /// Log and record a recovered problem.
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning.logged());
    }

    /// Whether content may still be appended; records a warning when not.
    fn accept_content(&mut self, what: &str) -> bool {
        match self.state {
            StreamState::Open | StreamState::Accumulating => {
                self.state = StreamState::Accumulating;
                true
            }
            StreamState::Closed | StreamState::Finalized => {
                self.warn(Warning::degraded(format!(
                    "{} {what} received after the stream closed, dropped",
                    self.provider
                )));
                false
            }
        }
    }

    pub fn append_text(&mut self, fragment: &str) {
        if fragment.is_empty() || !self.accept_content("text delta") {
            return;
        }
        self.text.push_str(fragment);
    }

    /// Append to the text buffer of content block `index`.
    pub fn append_block_text(&mut self, index: usize, fragment: &str) {
        if fragment.is_empty() || !self.accept_content("text delta") {
            return;
        }
        self.blocks.entry(index).or_default().push_str(fragment);
    }

    pub fn append_reasoning(&mut self, fragment: &str) {
        if fragment.is_empty() || !self.accept_content("reasoning delta") {
            return;
        }
        self.reasoning.push_str(fragment);
    }

    /// Apply a tool-call fragment at `index`.
    ///
    /// The id and name are taken from the first fragment that carries them; argument
    /// fragments are concatenated.
    pub fn tool_call_delta(
        &mut self,
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        if !self.accept_content("tool call delta") {
            return;
        }
        let buffer = self.tool_calls.entry(index).or_default();
        if buffer.closed {
            let label = buffer.id.clone().unwrap_or_else(|| format!("#{index}"));
            self.warn(Warning::degraded(format!(
                "fragment for closed tool call {label} dropped"
            )));
            return;
        }
        if buffer.id.is_none()
            && let Some(id) = id.filter(|s| !s.is_empty())
        {
            buffer.id = Some(id.to_string());
        }
        if buffer.name.is_empty()
            && let Some(name) = name.filter(|s| !s.is_empty())
        {
            buffer.name = name.to_string();
        }
        if let Some(fragment) = arguments {
            buffer.arguments.push_str(fragment);
        }
    }

    /// Mark the call at `index` complete and parse its arguments.
    pub fn close_tool_call(&mut self, index: usize) {
        let Some(buffer) = self.tool_calls.get_mut(&index) else {
            return;
        };
        if buffer.closed {
            return;
        }
        buffer.closed = true;
        let id = buffer.id.clone().unwrap_or_default();
        let converted = ToolCall::from_raw_arguments(id, buffer.name.clone(), &buffer.arguments);
        let (call, warnings) = converted.into_parts();
        buffer.parsed = Some(call.arguments);
        self.warnings.extend(warnings);
    }

    /// Record a call that arrived whole, with arguments already parsed.
    pub fn complete_tool_call(
        &mut self,
        index: usize,
        id: Option<&str>,
        name: &str,
        arguments: Map<String, Value>,
    ) {
        if !self.accept_content("tool call") {
            return;
        }
        self.tool_calls.insert(
            index,
            ToolCallBuffer {
                id: id.filter(|s| !s.is_empty()).map(str::to_string),
                name: name.to_string(),
                arguments: Value::Object(arguments.clone()).to_string(),
                parsed: Some(arguments),
                closed: true,
            },
        );
    }

    /// Replace the argument buffer with the vendor's final rendition, when the buffer
    /// is still open.
    pub fn set_tool_call_arguments(&mut self, index: usize, arguments: &str) {
        if let Some(buffer) = self.tool_calls.get_mut(&index)
            && !buffer.closed
        {
            buffer.arguments = arguments.to_string();
        }
    }

    pub fn set_finish_reason(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
    }

    pub fn merge_usage(&mut self, usage: &Usage) {
        match &mut self.usage {
            Some(current) => current.merge(usage),
            None => self.usage = Some(usage.clone()),
        }
    }

    /// The first model name seen wins.
    pub fn set_model(&mut self, model: &str) {
        if self.model.is_none() && !model.is_empty() {
            self.model = Some(model.to_string());
        }
    }

    /// The first response id seen wins.
    pub fn set_response_id(&mut self, id: &str) {
        if self.response_id.is_none() && !id.is_empty() {
            self.response_id = Some(id.to_string());
        }
    }

    /// Extra provider metadata copied onto the final message.
    pub fn set_metadata(&mut self, key: &str, value: Value) {
        self.extra.insert(key.to_string(), value);
    }

    /// Terminal event seen. Closing twice is harmless.
    pub fn close(&mut self) {
        if matches!(self.state, StreamState::Open | StreamState::Accumulating) {
            tracing::debug!(provider = self.provider, "stream closed");
            self.state = StreamState::Closed;
        }
    }

    /// Produce the final message. Allowed once; later calls fail with
    /// [`LlmError::StreamFinalized`].
    pub fn finalize(&mut self) -> Result<Message, LlmError> {
        if self.state == StreamState::Finalized {
            return Err(LlmError::StreamFinalized);
        }
        self.close();

        let open: Vec<usize> = self
            .tool_calls
            .iter()
            .filter(|(_, b)| !b.closed)
            .map(|(i, _)| *i)
            .collect();
        for index in open {
            self.close_tool_call(index);
        }

        let calls = self.collect_tool_calls();
        let text = self.text();
        let mut message = Message::ai_with_tool_calls(text, calls);

        if self.finish_reason.is_none() && !message.tool_calls().is_empty() {
            self.finish_reason = Some(FinishReason::ToolCalls);
        }

        let metadata = &mut message.metadata;
        metadata.insert(metadata_keys::PROVIDER.into(), Value::from(self.provider));
        if let Some(model) = &self.model {
            metadata.insert(metadata_keys::MODEL.into(), Value::from(model.clone()));
        }
        if let Some(id) = &self.response_id {
            metadata.insert(metadata_keys::RESPONSE_ID.into(), Value::from(id.clone()));
        }
        if let Some(reason) = &self.finish_reason
            && let Ok(value) = serde_json::to_value(reason)
        {
            metadata.insert(metadata_keys::FINISH_REASON.into(), value);
        }
        if let Some(usage) = &self.usage
            && let Ok(value) = serde_json::to_value(usage)
        {
            metadata.insert(metadata_keys::USAGE.into(), value);
        }
        if !self.reasoning.is_empty() {
            metadata.insert(
                metadata_keys::REASONING.into(),
                Value::from(self.reasoning.clone()),
            );
        }
        for (key, value) in &self.extra {
            metadata.insert(key.clone(), value.clone());
        }
        message.record_warnings(&self.warnings);

        self.state = StreamState::Finalized;
        tracing::debug!(
            provider = self.provider,
            tool_calls = message.tool_calls().len(),
            warnings = self.warnings.len(),
            "stream finalized"
        );
        Ok(message)
    }

    fn collect_tool_calls(&mut self) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        let mut warnings = Vec::new();
        for (index, buffer) in &self.tool_calls {
            if buffer.name.is_empty() {
                warnings.push(Warning::degraded(format!(
                    "tool call #{index} never received a name, dropped"
                )));
                continue;
            }
            calls.push(ToolCall {
                id: buffer.id.clone().unwrap_or_default(),
                function_name: buffer.name.clone(),
                arguments: buffer.parsed.clone().unwrap_or_default(),
            });
        }
        for warning in warnings {
            self.warn(warning);
        }
        self.warnings.extend(ToolCall::dedup_ids(&mut calls));
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn text_fragments_concatenate() {
        let mut acc = StreamAccumulator::new("test");
        assert_eq!(acc.state(), StreamState::Open);
        for fragment in ["Hel", "lo, ", "world"] {
            acc.append_text(fragment);
        }
        assert_eq!(acc.state(), StreamState::Accumulating);
        acc.close();
        let message = acc.finalize().unwrap();
        assert_eq!(message.text(), "Hello, world");
        assert!(message.warnings().is_empty());
    }

    #[test]
    fn finalize_twice_fails() {
        let mut acc = StreamAccumulator::new("test");
        acc.append_text("x");
        acc.finalize().unwrap();
        assert!(matches!(acc.finalize(), Err(LlmError::StreamFinalized)));
    }

    #[test]
    fn argument_fragments_never_overwrite() {
        let mut acc = StreamAccumulator::new("test");
        acc.tool_call_delta(0, Some("call_1"), Some("lookup"), Some("{\"q\":"));
        acc.tool_call_delta(0, None, Some("ignored"), Some("\"rust\"}"));
        let message = acc.finalize().unwrap();
        let call = &message.tool_calls()[0];
        assert_eq!(call.id, "call_1");
        assert_eq!(call.function_name, "lookup");
        assert_eq!(call.arguments["q"], "rust");
        assert_eq!(message.finish_reason(), Some(FinishReason::ToolCalls));
    }

    #[test]
    fn malformed_arguments_keep_the_call() {
        let mut acc = StreamAccumulator::new("test");
        acc.tool_call_delta(0, Some("call_1"), Some("lookup"), Some("{invalid"));
        acc.close_tool_call(0);
        let message = acc.finalize().unwrap();
        assert_eq!(message.tool_calls().len(), 1);
        assert!(message.tool_calls()[0].arguments.is_empty());
        assert_eq!(message.warnings().len(), 1);
    }

    #[test]
    fn content_after_close_is_dropped_but_usage_counts() {
        let mut acc = StreamAccumulator::new("test");
        acc.append_text("done");
        acc.set_finish_reason(FinishReason::Stop);
        acc.close();
        acc.append_text(" late");
        acc.merge_usage(&Usage::new(3, 4));
        let message = acc.finalize().unwrap();
        assert_eq!(message.text(), "done");
        assert_eq!(message.usage().unwrap().total_tokens, 7);
        assert_eq!(message.warnings().len(), 1);
    }

    #[test]
    fn ids_are_synthesized_and_deduplicated() {
        let mut acc = StreamAccumulator::new("test");
        acc.tool_call_delta(0, None, Some("a"), Some("{}"));
        acc.tool_call_delta(1, Some("same"), Some("b"), None);
        acc.tool_call_delta(2, Some("same"), Some("c"), None);
        acc.tool_call_delta(3, Some("x"), None, Some("{}"));
        let message = acc.finalize().unwrap();
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[1].id, "same");
        assert_ne!(calls[2].id, "same");
        assert_eq!(message.warnings().len(), 2);
    }

    #[test]
    fn reasoning_is_kept_apart() {
        let mut acc = StreamAccumulator::new("test");
        acc.append_reasoning("thinking...");
        acc.append_text("answer");
        let message = acc.finalize().unwrap();
        assert_eq!(message.text(), "answer");
        assert_eq!(message.reasoning(), Some("thinking..."));
    }

    #[test]
    fn block_buffers_follow_index_order() {
        let mut acc = StreamAccumulator::new("test");
        acc.append_block_text(1, "world");
        acc.append_block_text(0, "hello ");
        assert_eq!(acc.text(), "hello world");
    }

    #[test]
    #[traced_test]
    fn recovered_problems_are_logged() {
        let mut acc = StreamAccumulator::new("test");
        acc.tool_call_delta(0, Some("call_9"), Some("lookup"), Some("{invalid"));
        acc.close();
        acc.append_text("late");
        acc.finalize().unwrap();
        assert!(logs_contain("malformed arguments for tool call call_9"));
        assert!(logs_contain("received after the stream closed"));
        assert!(logs_contain("stream finalized"));
    }
}
