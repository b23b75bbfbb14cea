//! Declarative parameter rules
//!
//! A provider describes its parameter constraints as a [`ParameterProfile`]: an ordered
//! list of [`Rule`]s evaluated against the resolved parameter map.

use serde_json::Value;

use super::ValidationResult;
use crate::config::ProviderSettings;
use crate::types::{ChatParams, param_keys};

/// How out-of-range numbers are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    Error,
    Warn,
}

/// Expected JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Integer,
    String,
    Bool,
    Array,
    Object,
    StringOrArray,
    StringOrObject,
}

impl ValueKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::Integer => value.is_u64() || value.is_i64(),
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::StringOrArray => value.is_string() || value.is_array(),
            Self::StringOrObject => value.is_string() || value.is_object(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::String => "a string",
            Self::Bool => "a boolean",
            Self::Array => "an array",
            Self::Object => "an object",
            Self::StringOrArray => "a string or an array",
            Self::StringOrObject => "a string or an object",
        }
    }
}

/// Condition on the request used by [`Rule::ForbidWhen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    ModelPrefix(&'static str),
}

impl Condition {
    fn holds(&self, params: &ChatParams) -> bool {
        match self {
            Self::ModelPrefix(prefix) => params.model().is_some_and(|m| m.starts_with(prefix)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Field must be present and non-null.
    Required { field: &'static str },
    /// Field, when present, must have this JSON type.
    Type { field: &'static str, kind: ValueKind },
    /// Numeric field must be within `[min, max]`.
    Range {
        field: &'static str,
        min: f64,
        max: f64,
        mode: RangeMode,
    },
    /// Numeric field must be at least `min`.
    MinValue { field: &'static str, min: f64 },
    /// String field must start with one of the prefixes. Unmatched values are errors
    /// unless the provider settings allow unknown models.
    OneOfPrefix {
        field: &'static str,
        prefixes: &'static [&'static str],
    },
    /// String field must be one of `values`.
    OneOf {
        field: &'static str,
        values: &'static [&'static str],
    },
    /// Array field length ceiling; a string counts as one entry. For `tools` the
    /// provider settings may override the ceiling.
    MaxLen { field: &'static str, max: usize },
    /// Field must be absent when the condition holds.
    ForbidWhen {
        field: &'static str,
        condition: Condition,
        message: &'static str,
    },
}

/// Ordered rule set for one provider.
#[derive(Debug, Clone)]
pub struct ParameterProfile {
    pub provider: &'static str,
    pub rules: Vec<Rule>,
}

impl ParameterProfile {
    pub fn check(&self, params: &ChatParams, settings: &ProviderSettings) -> ValidationResult {
        let mut result = ValidationResult::new();
        for rule in &self.rules {
            self.apply(rule, params, settings, &mut result);
        }
        result
    }

    fn apply(
        &self,
        rule: &Rule,
        params: &ChatParams,
        settings: &ProviderSettings,
        result: &mut ValidationResult,
    ) {
        match rule {
            Rule::Required { field } => {
                if !params.contains(field) {
                    result.error(format!("{field} is required"));
                }
            }
            Rule::Type { field, kind } => {
                if let Some(value) = params.get(field)
                    && !kind.matches(value)
                {
                    result.error(format!("{field} must be {}, got {value}", kind.describe()));
                }
            }
            Rule::Range {
                field,
                min,
                max,
                mode,
            } => {
                if let Some(v) = params.f64(field)
                    && (v < *min || v > *max)
                {
                    let message = format!("{field} must be between {min} and {max}, got {v}");
                    match mode {
                        RangeMode::Error => result.error(message),
                        RangeMode::Warn => result.warn(message),
                    }
                }
            }
            Rule::MinValue { field, min } => {
                if let Some(v) = params.f64(field)
                    && v < *min
                {
                    result.error(format!("{field} must be at least {min}, got {v}"));
                }
            }
            Rule::OneOfPrefix { field, prefixes } => {
                let Some(value) = params.str(field) else {
                    return;
                };
                let known = prefixes.iter().any(|p| value.starts_with(p))
                    || settings
                        .extra_model_prefixes
                        .iter()
                        .any(|p| value.starts_with(p.as_str()));
                if !known {
                    let message = format!(
                        "{field} '{value}' is not a recognized {} model (expected prefix: {})",
                        self.provider,
                        prefixes.join(", ")
                    );
                    if settings.allow_unknown_models {
                        result.warn(message);
                    } else {
                        result.error(message);
                    }
                }
            }
            Rule::OneOf { field, values } => {
                if let Some(value) = params.str(field)
                    && !values.contains(&value)
                {
                    result.error(format!(
                        "{field} must be one of {}, got '{value}'",
                        values.join(", ")
                    ));
                }
            }
            Rule::MaxLen { field, max } => {
                let max = match (*field, settings.max_tools) {
                    (param_keys::TOOLS, Some(limit)) => limit,
                    _ => *max,
                };
                let len = match params.get(field) {
                    Some(Value::Array(items)) => items.len(),
                    Some(Value::String(_)) => 1,
                    _ => return,
                };
                if len > max {
                    result.error(format!(
                        "{field} accepts at most {max} entries for {}, got {len}",
                        self.provider
                    ));
                }
            }
            Rule::ForbidWhen {
                field,
                condition,
                message,
            } => {
                if params.contains(field) && condition.holds(params) {
                    result.error(*message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> ParameterProfile {
        ParameterProfile {
            provider: "test",
            rules: vec![
                Rule::Required { field: "model" },
                Rule::Type {
                    field: "temperature",
                    kind: ValueKind::Number,
                },
                Rule::Range {
                    field: "temperature",
                    min: 0.0,
                    max: 2.0,
                    mode: RangeMode::Error,
                },
                Rule::MinValue {
                    field: "top_k",
                    min: 1.0,
                },
                Rule::OneOfPrefix {
                    field: "model",
                    prefixes: &["gpt-"],
                },
                Rule::MaxLen {
                    field: "stop",
                    max: 2,
                },
                Rule::MaxLen {
                    field: "tools",
                    max: 3,
                },
                Rule::ForbidWhen {
                    field: "top_p",
                    condition: Condition::ModelPrefix("o1"),
                    message: "o1 models do not support top_p",
                },
            ],
        }
    }

    fn check(params: serde_json::Value) -> ValidationResult {
        profile().check(&ChatParams::from_value(params), &ProviderSettings::default())
    }

    #[test]
    fn range_violation_mentions_field() {
        let result = check(json!({"model": "gpt-4o", "temperature": 5.0}));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("temperature"));
    }

    #[test]
    fn type_violation_reported() {
        let result = check(json!({"model": "gpt-4o", "temperature": "hot"}));
        assert_eq!(result.errors, vec!["temperature must be a number, got \"hot\""]);
    }

    #[test]
    fn missing_model_and_bad_top_k() {
        let result = check(json!({"top_k": 0}));
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("model is required"));
        assert!(result.errors[1].contains("top_k"));
    }

    #[test]
    fn unknown_model_respects_settings() {
        let params = ChatParams::from_value(json!({"model": "llama-3"}));
        let strict = profile().check(&params, &ProviderSettings::default());
        assert!(!strict.is_valid);

        let relaxed = profile().check(
            &params,
            &ProviderSettings {
                allow_unknown_models: true,
                ..Default::default()
            },
        );
        assert!(relaxed.is_valid);
        assert_eq!(relaxed.warnings.len(), 1);

        let extended = profile().check(
            &params,
            &ProviderSettings {
                extra_model_prefixes: vec!["llama-".into()],
                ..Default::default()
            },
        );
        assert!(extended.is_valid && extended.warnings.is_empty());
    }

    #[test]
    fn list_ceilings_and_tool_override() {
        let params = ChatParams::from_value(json!({
            "model": "gpt-4o", "stop": ["a", "b", "c"], "tools": [{}, {}, {}, {}]
        }));
        let result = profile().check(&params, &ProviderSettings::default());
        assert_eq!(result.errors.len(), 2);

        let result = profile().check(
            &params,
            &ProviderSettings {
                max_tools: Some(10),
                ..Default::default()
            },
        );
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn forbid_when_model_matches() {
        let result = check(json!({"model": "o1-mini", "top_p": 0.5}));
        assert!(result.errors.iter().any(|e| e.contains("top_p")));
    }
}
