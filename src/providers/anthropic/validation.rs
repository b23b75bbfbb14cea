use serde_json::Value;

use crate::config::ProviderSettings;
use crate::providers::REASONING_EFFORTS;
use crate::types::{ChatParams, Message, param_keys as keys};
use crate::validation::messages::{check_has_conversation, check_messages};
use crate::validation::response::{check_usage, require_array, require_object};
use crate::validation::tools::{STRICT_TOOL_NAME, check_tool_choice, check_tools};
use crate::validation::{
    ParameterProfile, RangeMode, RequestValidator, ResponseValidator, Rule, ValidationResult,
    ValueKind,
};

pub const ANTHROPIC_MODEL_PREFIXES: &[&str] = &["claude-"];

#[derive(Debug, Clone)]
pub struct AnthropicValidator {
    pub settings: ProviderSettings,
    profile: ParameterProfile,
}

impl AnthropicValidator {
    pub fn new(settings: ProviderSettings) -> Self {
        let rules = vec![
            Rule::Required { field: keys::MODEL },
            Rule::Type {
                field: keys::MODEL,
                kind: ValueKind::String,
            },
            Rule::OneOfPrefix {
                field: keys::MODEL,
                prefixes: ANTHROPIC_MODEL_PREFIXES,
            },
            Rule::Type {
                field: keys::TEMPERATURE,
                kind: ValueKind::Number,
            },
            Rule::Range {
                field: keys::TEMPERATURE,
                min: 0.0,
                max: 1.0,
                mode: RangeMode::Error,
            },
            Rule::Type {
                field: keys::TOP_P,
                kind: ValueKind::Number,
            },
            Rule::Range {
                field: keys::TOP_P,
                min: 0.0,
                max: 1.0,
                mode: RangeMode::Error,
            },
            Rule::Type {
                field: keys::TOP_K,
                kind: ValueKind::Integer,
            },
            Rule::MinValue {
                field: keys::TOP_K,
                min: 1.0,
            },
            Rule::Type {
                field: keys::MAX_TOKENS,
                kind: ValueKind::Integer,
            },
            Rule::MinValue {
                field: keys::MAX_TOKENS,
                min: 1.0,
            },
            Rule::Type {
                field: keys::STOP,
                kind: ValueKind::StringOrArray,
            },
            Rule::Type {
                field: keys::TOOLS,
                kind: ValueKind::Array,
            },
            Rule::MaxLen {
                field: keys::TOOLS,
                max: 128,
            },
            Rule::Type {
                field: keys::STREAM,
                kind: ValueKind::Bool,
            },
            Rule::OneOf {
                field: keys::REASONING_EFFORT,
                values: REASONING_EFFORTS,
            },
            Rule::Type {
                field: keys::THINKING_BUDGET,
                kind: ValueKind::Integer,
            },
            Rule::MinValue {
                field: keys::THINKING_BUDGET,
                min: 1024.0,
            },
        ];
        Self {
            settings,
            profile: ParameterProfile {
                provider: "anthropic",
                rules,
            },
        }
    }
}

impl RequestValidator for AnthropicValidator {
    fn validate_request(&self, messages: &[Message], params: &ChatParams) -> ValidationResult {
        let mut result = self.profile.check(params, &self.settings);
        let pattern = self.settings.strict_tool_names().then_some(&*STRICT_TOOL_NAME);
        check_tools(params, pattern, &mut result);
        check_tool_choice(params, &mut result);
        check_messages(messages, &mut result);
        check_has_conversation(messages, &mut result);
        result
    }
}

impl ResponseValidator for AnthropicValidator {
    fn validate_response(&self, response: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();
        if require_object(response, &mut result).is_none() {
            return result;
        }
        // Individual blocks are checked by the content codec.
        match response.get("content") {
            Some(Value::Array(_)) => {}
            Some(_) => {
                require_array(response, "content", "", &mut result);
            }
            None => result.error("content is missing"),
        }
        if let Some(role) = response.get("role").and_then(Value::as_str)
            && role != "assistant"
        {
            result.warn(format!("unexpected role '{role}'"));
        }
        check_usage(
            response.get("usage"),
            &["input_tokens", "output_tokens", "cache_read_input_tokens"],
            "usage",
            &mut result,
        );
        result
    }
}
