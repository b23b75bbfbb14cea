use serde_json::Value;

use crate::config::ProviderSettings;
use crate::providers::openai::OPENAI_MODEL_PREFIXES;
use crate::providers::openai::validation::openai_rules;
use crate::types::{ChatParams, Message, param_keys as keys};
use crate::validation::messages::check_messages;
use crate::validation::response::{check_usage, require_array, require_object};
use crate::validation::tools::{STRICT_TOOL_NAME, check_tool_choice, check_tools};
use crate::validation::{
    ParameterProfile, RequestValidator, ResponseValidator, Rule, ValidationResult, ValueKind,
};

const USAGE_COUNTERS: &[&str] = &[
    "input_tokens",
    "output_tokens",
    "total_tokens",
    "prompt_tokens",
    "completion_tokens",
];

/// Output item types this adapter understands; others are passed over with a warning.
const KNOWN_ITEMS: &[&str] = &[
    "message",
    "function_call",
    "reasoning",
    "web_search_call",
    "file_search_call",
];

#[derive(Debug, Clone)]
pub struct ResponsesValidator {
    pub settings: ProviderSettings,
    profile: ParameterProfile,
}

impl ResponsesValidator {
    pub fn new(settings: ProviderSettings) -> Self {
        let mut rules = openai_rules(OPENAI_MODEL_PREFIXES);
        rules.push(Rule::Type {
            field: keys::PREVIOUS_RESPONSE_ID,
            kind: ValueKind::String,
        });
        Self {
            settings,
            profile: ParameterProfile {
                provider: "openai_responses",
                rules,
            },
        }
    }
}

impl RequestValidator for ResponsesValidator {
    fn validate_request(&self, messages: &[Message], params: &ChatParams) -> ValidationResult {
        let mut result = self.profile.check(params, &self.settings);
        let pattern = self.settings.strict_tool_names().then_some(&*STRICT_TOOL_NAME);
        check_tools(params, pattern, &mut result);
        check_tool_choice(params, &mut result);
        check_messages(messages, &mut result);
        result
    }
}

impl ResponseValidator for ResponsesValidator {
    fn validate_response(&self, response: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();
        if require_object(response, &mut result).is_none() {
            return result;
        }
        if response.get("choices").is_some() {
            require_array(response, "choices", "", &mut result);
        } else if let Some(items) = require_array(response, "output", "", &mut result) {
            for (i, item) in items.iter().enumerate() {
                match item.get("type").and_then(Value::as_str) {
                    Some(kind) if KNOWN_ITEMS.contains(&kind) => {}
                    Some(kind) => result.warn(format!("output[{i}] has unhandled type '{kind}'")),
                    None => result.error(format!("output[{i}] has no type")),
                }
            }
        }
        if let Some(status) = response.get("status").and_then(Value::as_str)
            && !matches!(status, "completed" | "incomplete" | "in_progress")
        {
            result.warn(format!("unexpected status '{status}'"));
        }
        check_usage(response.get("usage"), USAGE_COUNTERS, "usage", &mut result);
        result
    }
}
