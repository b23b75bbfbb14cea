use serde_json::Value;

use crate::config::ProviderSettings;
use crate::providers::REASONING_EFFORTS;
use crate::types::{ChatParams, Message, param_keys as keys};
use crate::validation::messages::{check_has_conversation, check_messages};
use crate::validation::response::{check_usage, expect_object, require_array, require_object};
use crate::validation::tools::{GEMINI_TOOL_NAME, check_tool_choice, check_tools};
use crate::validation::{
    ParameterProfile, RangeMode, RequestValidator, ResponseValidator, Rule, ValidationResult,
    ValueKind,
};

pub const GEMINI_MODEL_PREFIXES: &[&str] = &["gemini-", "gemma-", "learnlm-", "models/gemini-"];

const USAGE_COUNTERS: &[&str] = &[
    "promptTokenCount",
    "candidatesTokenCount",
    "totalTokenCount",
    "thoughtsTokenCount",
    "cachedContentTokenCount",
];

#[derive(Debug, Clone)]
pub struct GeminiValidator {
    pub settings: ProviderSettings,
    profile: ParameterProfile,
}

impl GeminiValidator {
    pub fn new(settings: ProviderSettings) -> Self {
        let rules = vec![
            Rule::Required { field: keys::MODEL },
            Rule::Type {
                field: keys::MODEL,
                kind: ValueKind::String,
            },
            Rule::OneOfPrefix {
                field: keys::MODEL,
                prefixes: GEMINI_MODEL_PREFIXES,
            },
            Rule::Type {
                field: keys::TEMPERATURE,
                kind: ValueKind::Number,
            },
            Rule::Range {
                field: keys::TEMPERATURE,
                min: 0.0,
                max: 2.0,
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
                field: keys::N,
                kind: ValueKind::Integer,
            },
            Rule::Range {
                field: keys::N,
                min: 1.0,
                max: 8.0,
                mode: RangeMode::Error,
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
            Rule::MaxLen {
                field: keys::STOP,
                max: 5,
            },
            Rule::Type {
                field: keys::TOOLS,
                kind: ValueKind::Array,
            },
            Rule::MaxLen {
                field: keys::TOOLS,
                max: 100,
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
                min: 0.0,
            },
            Rule::Type {
                field: keys::RESPONSE_FORMAT,
                kind: ValueKind::Object,
            },
        ];
        Self {
            settings,
            profile: ParameterProfile {
                provider: "gemini",
                rules,
            },
        }
    }
}

impl RequestValidator for GeminiValidator {
    fn validate_request(&self, messages: &[Message], params: &ChatParams) -> ValidationResult {
        let mut result = self.profile.check(params, &self.settings);
        let pattern = self.settings.strict_tool_names().then_some(&*GEMINI_TOOL_NAME);
        check_tools(params, pattern, &mut result);
        check_tool_choice(params, &mut result);
        check_messages(messages, &mut result);
        check_has_conversation(messages, &mut result);
        result
    }
}

impl ResponseValidator for GeminiValidator {
    /// A missing `candidates` is tolerated when `promptFeedback` explains the block.
    fn validate_response(&self, response: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();
        if require_object(response, &mut result).is_none() {
            return result;
        }
        match response.get("candidates") {
            None if response.get("promptFeedback").is_some() => {
                result.warn("no candidates: prompt was blocked");
            }
            None => result.error("candidates is missing"),
            Some(_) => {
                if let Some(candidates) = require_array(response, "candidates", "", &mut result) {
                    for (i, candidate) in candidates.iter().enumerate() {
                        let path = format!("candidates[{i}].");
                        expect_object(candidate, "content", &path, &mut result);
                        if let Some(content) = candidate.get("content").filter(|c| c.is_object())
                            && content.get("parts").is_some()
                        {
                            let parts_path = format!("{path}content.");
                            require_array(content, "parts", &parts_path, &mut result);
                        }
                    }
                }
            }
        }
        check_usage(response.get("usageMetadata"), USAGE_COUNTERS, "usageMetadata", &mut result);
        result
    }
}
