use serde_json::Value;

use crate::config::ProviderSettings;
use crate::providers::REASONING_EFFORTS;
use crate::types::{ChatParams, Message, param_keys as keys};
use crate::validation::messages::check_messages;
use crate::validation::response::{check_usage, expect_object, require_array, require_object};
use crate::validation::tools::{STRICT_TOOL_NAME, check_tool_choice, check_tools};
use crate::validation::{
    Condition, ParameterProfile, RangeMode, RequestValidator, ResponseValidator, Rule,
    ValidationResult, ValueKind,
};

pub const OPENAI_MODEL_PREFIXES: &[&str] =
    &["gpt-", "o1", "o3", "o4", "chatgpt-", "ft:gpt-", "codex-"];

/// Parameter rules shared by chat completions and Responses.
pub(crate) fn openai_rules(prefixes: &'static [&'static str]) -> Vec<Rule> {
    vec![
        Rule::Required { field: keys::MODEL },
        Rule::Type {
            field: keys::MODEL,
            kind: ValueKind::String,
        },
        Rule::OneOfPrefix {
            field: keys::MODEL,
            prefixes,
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
        Rule::Range {
            field: keys::PRESENCE_PENALTY,
            min: -2.0,
            max: 2.0,
            mode: RangeMode::Error,
        },
        Rule::Range {
            field: keys::FREQUENCY_PENALTY,
            min: -2.0,
            max: 2.0,
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
            max: 4,
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
        Rule::Type {
            field: keys::SEED,
            kind: ValueKind::Integer,
        },
        Rule::Type {
            field: keys::USER,
            kind: ValueKind::String,
        },
        Rule::Type {
            field: keys::RESPONSE_FORMAT,
            kind: ValueKind::Object,
        },
        Rule::OneOf {
            field: keys::REASONING_EFFORT,
            values: REASONING_EFFORTS,
        },
        Rule::ForbidWhen {
            field: keys::TEMPERATURE,
            condition: Condition::ModelPrefix("o1"),
            message: "o1 models do not support temperature",
        },
        Rule::ForbidWhen {
            field: keys::TOP_P,
            condition: Condition::ModelPrefix("o1"),
            message: "o1 models do not support top_p",
        },
    ]
}

#[derive(Debug, Clone)]
pub struct OpenAiValidator {
    pub settings: ProviderSettings,
    profile: ParameterProfile,
}

impl OpenAiValidator {
    pub fn new(settings: ProviderSettings) -> Self {
        let mut rules = openai_rules(OPENAI_MODEL_PREFIXES);
        rules.extend([
            Rule::Type {
                field: keys::N,
                kind: ValueKind::Integer,
            },
            Rule::MinValue {
                field: keys::N,
                min: 1.0,
            },
        ]);
        Self {
            settings,
            profile: ParameterProfile {
                provider: "openai",
                rules,
            },
        }
    }
}

impl RequestValidator for OpenAiValidator {
    fn validate_request(&self, messages: &[Message], params: &ChatParams) -> ValidationResult {
        let mut result = self.profile.check(params, &self.settings);
        let pattern = self.settings.strict_tool_names().then_some(&*STRICT_TOOL_NAME);
        check_tools(params, pattern, &mut result);
        check_tool_choice(params, &mut result);
        check_messages(messages, &mut result);
        result
    }
}

impl ResponseValidator for OpenAiValidator {
    fn validate_response(&self, response: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();
        if require_object(response, &mut result).is_none() {
            return result;
        }
        if let Some(choices) = require_array(response, "choices", "", &mut result) {
            for (i, choice) in choices.iter().enumerate() {
                let path = format!("choices[{i}].");
                match choice.get("message") {
                    Some(message) if message.is_object() => {
                        if let Some(content) = message.get("content")
                            && !(content.is_string() || content.is_null() || content.is_array())
                        {
                            result.error(format!("{path}message.content has an unexpected type"));
                        }
                        if let Some(calls) = message.get("tool_calls")
                            && !calls.is_array()
                        {
                            result.error(format!("{path}message.tool_calls must be an array"));
                        }
                    }
                    Some(_) => expect_object(choice, "message", &path, &mut result),
                    None => result.error(format!("{path}message is missing")),
                }
            }
        }
        check_usage(
            response.get("usage"),
            &["prompt_tokens", "completion_tokens", "total_tokens"],
            "usage",
            &mut result,
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> OpenAiValidator {
        OpenAiValidator::new(ProviderSettings::default())
    }

    #[test]
    fn temperature_out_of_range() {
        let params = ChatParams::new("gpt-4o").with_temperature(5.0);
        let result = validator().validate_request(&[Message::human("hi")], &params);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("temperature"));
    }

    #[test]
    fn too_many_stop_sequences() {
        let params = ChatParams::new("gpt-4o").with_stop(["a", "b", "c", "d", "e"]);
        let result = validator().validate_request(&[Message::human("hi")], &params);
        assert!(result.errors.iter().any(|e| e.contains("stop")));
    }

    #[test]
    fn unknown_model_rejected() {
        let params = ChatParams::new("claude-3-opus");
        let result = validator().validate_request(&[Message::human("hi")], &params);
        assert!(result.errors.iter().any(|e| e.contains("claude-3-opus")));
    }

    #[test]
    fn response_shape_findings() {
        let result = validator().validate_response(&json!({
            "choices": [{"message": {"content": 3}}],
            "usage": {"prompt_tokens": -1}
        }));
        assert_eq!(result.errors.len(), 2);
        let result = validator().validate_response(&json!({"id": "x"}));
        assert!(result.errors[0].contains("choices"));
    }
}
