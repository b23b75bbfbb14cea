//! Resolved adapter configuration
//!
//! Loading, layering and caching configuration belongs to the caller. This module only
//! describes the per-provider knobs the converters read, deserializable from whatever
//! JSON the caller resolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::providers::ProviderKind;

/// Knobs for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// `max_tokens` used when the request does not set one (required by Anthropic).
    pub default_max_tokens: Option<u64>,
    /// Override the provider's tool-count ceiling.
    pub max_tools: Option<usize>,
    /// Report unrecognized model names as warnings instead of validation errors.
    pub allow_unknown_models: bool,
    /// Extra model-name prefixes accepted in addition to the built-in ones.
    pub extra_model_prefixes: Vec<String>,
    /// Enforce the strict tool-name pattern (letters, digits, `_`, `-`, at most 64 chars).
    pub strict_tool_names: Option<bool>,
    /// Override the `reasoning_effort` → thinking-budget table.
    pub reasoning_budgets: BTreeMap<String, u64>,
}

impl ProviderSettings {
    pub fn strict_tool_names(&self) -> bool {
        self.strict_tool_names.unwrap_or(true)
    }

    /// Budget for `effort`, consulting overrides before `defaults`.
    pub fn reasoning_budget(&self, effort: &str, defaults: &[(&str, u64)]) -> Option<u64> {
        let effort = effort.to_ascii_lowercase();
        self.reasoning_budgets.get(&effort).copied().or_else(|| {
            defaults
                .iter()
                .find(|(name, _)| *name == effort)
                .map(|(_, budget)| *budget)
        })
    }
}

/// Configuration for every built-in converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub gemini: ProviderSettings,
    pub responses: ProviderSettings,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            openai: ProviderSettings::default(),
            anthropic: ProviderSettings {
                default_max_tokens: Some(4096),
                ..Default::default()
            },
            gemini: ProviderSettings::default(),
            responses: ProviderSettings::default(),
        }
    }
}

impl AdapterConfig {
    /// Deserialize from a resolved JSON value; missing sections take defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, LlmError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAiResponses => &self.responses,
        }
    }

    /// Relax model checks for every provider.
    pub fn allow_unknown_models(mut self) -> Self {
        for settings in [
            &mut self.openai,
            &mut self.anthropic,
            &mut self.gemini,
            &mut self.responses,
        ] {
            settings.allow_unknown_models = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AdapterConfig::from_value(json!({
            "gemini": {"allow_unknown_models": true, "reasoning_budgets": {"high": 32768}}
        }))
        .unwrap();
        assert_eq!(config.anthropic.default_max_tokens, Some(4096));
        assert!(config.gemini.allow_unknown_models);
        assert_eq!(
            config.gemini.reasoning_budget("HIGH", &[("high", 24576)]),
            Some(32768)
        );
        assert_eq!(
            config.gemini.reasoning_budget("low", &[("low", 1024)]),
            Some(1024)
        );
        assert!(config.openai.strict_tool_names());
    }

    #[test]
    fn bad_shape_is_a_json_error() {
        let err = AdapterConfig::from_value(json!({"openai": {"max_tools": "many"}})).unwrap_err();
        assert!(matches!(err, LlmError::Json(_)));
    }
}
