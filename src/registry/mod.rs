//! Converter registry
//!
//! An immutable name → converter map, built once from [`AdapterConfig`] and shared
//! behind an `Arc`. Lookups are case-insensitive and accept each provider's aliases.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::AdapterConfig;
use crate::error::LlmError;
use crate::providers::{
    AnthropicConverter, GeminiConverter, OpenAiConverter, OpenAiResponsesConverter,
    ProviderConverter, ProviderKind,
};

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[derive(Clone, Default)]
pub struct ConverterRegistry {
    by_name: HashMap<String, Arc<dyn ProviderConverter>>,
    aliases: HashMap<String, String>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("providers", &self.names())
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl ConverterRegistry {
    /// Empty registry; populate it with [`ConverterRegistry::with_converter`].
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in converters with default settings.
    pub fn builtin() -> Self {
        Self::from_config(&AdapterConfig::default())
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        let converters: [Arc<dyn ProviderConverter>; 4] = [
            Arc::new(OpenAiConverter::new(config.settings(ProviderKind::OpenAi).clone())),
            Arc::new(AnthropicConverter::new(config.settings(ProviderKind::Anthropic).clone())),
            Arc::new(GeminiConverter::new(config.settings(ProviderKind::Gemini).clone())),
            Arc::new(OpenAiResponsesConverter::new(
                config.settings(ProviderKind::OpenAiResponses).clone(),
            )),
        ];
        let registry = converters
            .into_iter()
            .fold(Self::new(), |registry, converter| registry.with_converter(converter));
        tracing::debug!(providers = ?registry.names(), "converter registry built");
        registry
    }

    /// Register `converter` under its kind's canonical name and aliases, replacing any
    /// earlier entry.
    pub fn with_converter(mut self, converter: Arc<dyn ProviderConverter>) -> Self {
        let kind = converter.kind();
        let name = kind.as_str().to_string();
        for alias in kind.aliases() {
            self.aliases.insert(normalize(alias), name.clone());
        }
        self.by_name.insert(name, converter);
        self
    }

    /// Extra alias for an already registered provider.
    pub fn with_alias(mut self, alias: &str, provider: ProviderKind) -> Self {
        self.aliases.insert(normalize(alias), provider.as_str().to_string());
        self
    }

    /// Canonical provider name for `name`, if registered.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let key = normalize(name);
        let canonical = self.aliases.get(&key).unwrap_or(&key);
        self.by_name.get_key_value(canonical).map(|(k, _)| k.as_str())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ProviderConverter>, LlmError> {
        self.resolve(name)
            .and_then(|canonical| self.by_name.get(canonical))
            .cloned()
            .ok_or_else(|| LlmError::UnknownProvider(name.to_string()))
    }

    pub fn get_kind(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderConverter>, LlmError> {
        self.get(kind.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Canonical names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_all_providers() {
        let registry = ConverterRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["anthropic", "gemini", "openai", "openai_responses"]
        );
        assert_eq!(registry.get("Claude").unwrap().kind(), ProviderKind::Anthropic);
        assert_eq!(registry.resolve(" google "), Some("gemini"));
        assert_eq!(registry.get("responses").unwrap().name(), "openai_responses");
    }

    #[test]
    fn unknown_provider() {
        let Err(err) = ConverterRegistry::builtin().get("cohere") else {
            panic!("expected an unknown provider error");
        };
        assert!(matches!(err, LlmError::UnknownProvider(ref name) if name == "cohere"));
    }

    #[test]
    fn custom_registry_and_alias() {
        let registry = ConverterRegistry::new()
            .with_converter(Arc::new(OpenAiConverter::default()))
            .with_alias("azure", ProviderKind::OpenAi)
            .with_alias("vertex", ProviderKind::Gemini);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("azure"));
        assert!(!registry.contains("vertex"));
    }

    #[test]
    fn config_reaches_converters() {
        let config = AdapterConfig::from_value(serde_json::json!({
            "openai": {"allow_unknown_models": true}
        }))
        .unwrap();
        let registry = ConverterRegistry::from_config(&config);
        let converted = registry
            .get("openai")
            .unwrap()
            .convert_request(
                &[crate::types::Message::human("hi")],
                &crate::types::ChatParams::new("my-finetune"),
            )
            .unwrap();
        assert_eq!(converted.warnings.len(), 1);
    }
}
