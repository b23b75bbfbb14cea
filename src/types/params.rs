//! Resolved request parameters
//!
//! The configuration collaborator hands the adapter an already-merged parameter map.
//! It stays untyped JSON so validation can report mistyped values instead of having
//! them rejected at deserialization time; typed accessors and a builder sit on top.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::tools::{ToolChoice, ToolDefinition};

/// Parameter keys understood by the converters.
pub mod keys {
    pub const MODEL: &str = "model";
    pub const TEMPERATURE: &str = "temperature";
    pub const TOP_P: &str = "top_p";
    pub const TOP_K: &str = "top_k";
    pub const MAX_TOKENS: &str = "max_tokens";
    pub const STOP: &str = "stop";
    pub const N: &str = "n";
    pub const PRESENCE_PENALTY: &str = "presence_penalty";
    pub const FREQUENCY_PENALTY: &str = "frequency_penalty";
    pub const SEED: &str = "seed";
    pub const USER: &str = "user";
    pub const STREAM: &str = "stream";
    pub const TOOLS: &str = "tools";
    pub const TOOL_CHOICE: &str = "tool_choice";
    pub const REASONING_EFFORT: &str = "reasoning_effort";
    pub const THINKING_BUDGET: &str = "thinking_budget";
    pub const RESPONSE_FORMAT: &str = "response_format";
    pub const PREVIOUS_RESPONSE_ID: &str = "previous_response_id";
    pub const METADATA: &str = "metadata";
}

/// Request parameters as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatParams(Map<String, Value>);

impl ChatParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self::default().with(keys::MODEL, Value::String(model.into()))
    }

    /// Wrap a JSON value; anything but an object yields empty params.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn with_temperature(self, temperature: f64) -> Self {
        self.with(keys::TEMPERATURE, Value::from(temperature))
    }

    pub fn with_top_p(self, top_p: f64) -> Self {
        self.with(keys::TOP_P, Value::from(top_p))
    }

    pub fn with_top_k(self, top_k: u64) -> Self {
        self.with(keys::TOP_K, Value::from(top_k))
    }

    pub fn with_max_tokens(self, max_tokens: u64) -> Self {
        self.with(keys::MAX_TOKENS, Value::from(max_tokens))
    }

    pub fn with_stop<I, S>(self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stop = stop
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect::<Vec<_>>();
        self.with(keys::STOP, Value::Array(stop))
    }

    pub fn with_stream(self, stream: bool) -> Self {
        self.with(keys::STREAM, Value::Bool(stream))
    }

    pub fn with_tools(self, tools: &[ToolDefinition]) -> Self {
        let tools = serde_json::to_value(tools).unwrap_or_else(|_| Value::Array(Vec::new()));
        self.with(keys::TOOLS, tools)
    }

    pub fn with_tool_choice(self, choice: &ToolChoice) -> Self {
        let value = match choice {
            ToolChoice::Auto => Value::from("auto"),
            ToolChoice::None => Value::from("none"),
            ToolChoice::Any => Value::from("any"),
            ToolChoice::Specific { name } => serde_json::json!({"type": "specific", "name": name}),
        };
        self.with(keys::TOOL_CHOICE, value)
    }

    pub fn with_reasoning_effort(self, effort: impl Into<String>) -> Self {
        self.with(keys::REASONING_EFFORT, Value::String(effort.into()))
    }

    pub fn with_thinking_budget(self, budget: u64) -> Self {
        self.with(keys::THINKING_BUDGET, Value::from(budget))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn model(&self) -> Option<&str> {
        self.get(keys::MODEL).and_then(Value::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn is_stream(&self) -> bool {
        self.get(keys::STREAM).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Stop sequences; a single string counts as one sequence.
    pub fn stop_sequences(&self) -> Vec<String> {
        match self.get(keys::STOP) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Tool definitions; entries that do not deserialize are skipped.
    ///
    /// OpenAI-shaped entries (`{type:"function",function:{...}}`) are unwrapped.
    pub fn tools(&self) -> Vec<ToolDefinition> {
        let Some(Value::Array(items)) = self.get(keys::TOOLS) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let def = item.get("function").unwrap_or(item);
                serde_json::from_value(def.clone()).ok()
            })
            .collect()
    }

    pub fn tool_choice(&self) -> Option<ToolChoice> {
        self.get(keys::TOOL_CHOICE).and_then(ToolChoice::from_value)
    }
}

impl From<Map<String, Value>> for ChatParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
