use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token accounting reported by the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u64>,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            ..Default::default()
        }
    }

    /// Overlay the counters present in `other`; zero counters in `other` do not erase known ones.
    pub fn merge(&mut self, other: &Usage) {
        if other.prompt_tokens > 0 {
            self.prompt_tokens = other.prompt_tokens;
        }
        if other.completion_tokens > 0 {
            self.completion_tokens = other.completion_tokens;
        }
        // A partial update (output-only, as Anthropic sends) must not shrink the total.
        self.total_tokens = other
            .total_tokens
            .max(self.total_tokens)
            .max(self.prompt_tokens + self.completion_tokens);
        if other.reasoning_tokens.is_some() {
            self.reasoning_tokens = other.reasoning_tokens;
        }
        if other.cached_tokens.is_some() {
            self.cached_tokens = other.cached_tokens;
        }
    }
}

/// Read a counter that may arrive as a number or a numeric string.
pub(crate) fn counter(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    StopSequence,
    Error,
    Other(String),
}

impl FinishReason {
    /// Map a vendor stop token from any of the supported providers.
    pub fn from_vendor(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "STOP" | "completed" => Self::Stop,
            "length" | "max_tokens" | "MAX_TOKENS" | "max_output_tokens" | "incomplete" => {
                Self::Length
            }
            "tool_calls" | "function_call" | "tool_use" => Self::ToolCalls,
            "content_filter" | "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT"
            | "SPII" | "refusal" => Self::ContentFilter,
            "stop_sequence" => Self::StopSequence,
            "error" | "failed" | "MALFORMED_FUNCTION_CALL" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vendor_tokens_map() {
        assert_eq!(FinishReason::from_vendor("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_vendor("MAX_TOKENS"), FinishReason::Length);
        assert_eq!(FinishReason::from_vendor("tool_use"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_vendor("SAFETY"), FinishReason::ContentFilter);
        assert_eq!(
            FinishReason::from_vendor("pause_turn"),
            FinishReason::Other("pause_turn".into())
        );
    }

    #[test]
    fn merge_keeps_known_counters() {
        let mut usage = Usage::new(10, 0);
        usage.merge(&Usage {
            completion_tokens: 5,
            ..Default::default()
        });
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn counters_accept_strings() {
        assert_eq!(counter(Some(&json!("12"))), Some(12));
        assert_eq!(counter(Some(&json!(7))), Some(7));
        assert_eq!(counter(Some(&json!(null))), None);
    }
}
