//! Tool definitions, tool choice and tool calls

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Warning;
use crate::types::Converted;

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema object describing the arguments.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Function taking no arguments.
    pub fn without_parameters(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, empty_object_schema())
    }
}

/// Normalized tool-use policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// Tools must not be called.
    None,
    /// The model must call some tool.
    Any,
    /// The model must call this tool.
    Specific { name: String },
}

impl ToolChoice {
    pub fn specific(name: impl Into<String>) -> Self {
        Self::Specific { name: name.into() }
    }

    /// Lenient parse of the common wire spellings.
    ///
    /// Accepts `"auto"`, `"none"`, `"any"`/`"required"`, a bare tool name, and the object
    /// forms used by OpenAI (`{type:"function",function:{name}}`), Anthropic
    /// (`{type:"tool",name}`) and the canonical `{type:"specific",name}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(match s.as_str() {
                "auto" => Self::Auto,
                "none" => Self::None,
                "any" | "required" => Self::Any,
                name => Self::specific(name),
            }),
            Value::Object(obj) => {
                let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
                let name = obj
                    .get("name")
                    .or_else(|| obj.get("function").and_then(|f| f.get("name")))
                    .and_then(Value::as_str);
                match (kind, name) {
                    (_, Some(name)) => Some(Self::specific(name)),
                    ("auto", None) => Some(Self::Auto),
                    ("none", None) => Some(Self::None),
                    ("any" | "required", None) => Some(Self::Any),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// A model-requested function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "name")]
    pub function_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Build a call; non-object `arguments` are wrapped as `{"value": ...}`.
    pub fn new(id: impl Into<String>, function_name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments,
        }
    }

    /// Fresh `call_<uuid>` id for calls the vendor did not name.
    pub fn synthesize_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }

    /// Build a call from a raw JSON argument string.
    ///
    /// Empty input means no arguments. Anything that does not parse to a JSON object
    /// degrades to an empty map and a [`Warning::MalformedToolArguments`].
    pub fn from_raw_arguments(
        id: impl Into<String>,
        function_name: impl Into<String>,
        raw: &str,
    ) -> Converted<Self> {
        let id = id.into();
        let function_name = function_name.into();
        let (arguments, warning) = parse_arguments(raw);
        let warnings = warning
            .map(|reason| {
                Warning::MalformedToolArguments {
                    tool_call_id: id.clone(),
                    name: function_name.clone(),
                    reason,
                }
                .logged()
            })
            .into_iter()
            .collect();
        Converted::with_warnings(
            Self {
                id,
                function_name,
                arguments,
            },
            warnings,
        )
    }

    /// Arguments serialized as a compact JSON string.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }

    /// Give every call a unique id within one message.
    ///
    /// The first call keeps a repeated id; later ones get a synthesized id and a
    /// [`Warning::Degraded`].
    pub fn dedup_ids(calls: &mut [ToolCall]) -> Vec<Warning> {
        let mut seen = HashSet::new();
        let mut warnings = Vec::new();
        for call in calls.iter_mut() {
            if call.id.is_empty() {
                call.id = Self::synthesize_id();
            } else if seen.contains(&call.id) {
                let fresh = Self::synthesize_id();
                warnings.push(
                    Warning::degraded(format!(
                        "duplicate tool call id {} replaced with {fresh}",
                        call.id
                    ))
                    .logged(),
                );
                call.id = fresh;
            }
            seen.insert(call.id.clone());
        }
        warnings
    }
}

/// Parse an argument string into a map, returning the failure reason when it degrades.
fn parse_arguments(raw: &str) -> (Map<String, Value>, Option<String>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (Map::new(), None);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => (map, None),
        Ok(Value::Null) => (Map::new(), None),
        Ok(other) => (
            Map::new(),
            Some(format!("expected a JSON object, got {other}")),
        ),
        Err(e) => (Map::new(), Some(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_arguments_degrade_to_empty_map() {
        let converted = ToolCall::from_raw_arguments("call_1", "lookup", "{invalid");
        assert!(converted.value.arguments.is_empty());
        assert_eq!(converted.value.function_name, "lookup");
        assert!(matches!(
            converted.warnings.as_slice(),
            [Warning::MalformedToolArguments { tool_call_id, .. }] if tool_call_id == "call_1"
        ));
    }

    #[test]
    fn empty_arguments_are_not_a_warning() {
        let converted = ToolCall::from_raw_arguments("call_1", "now", "  ");
        assert!(converted.is_clean());
        assert!(converted.value.arguments.is_empty());
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        let converted = ToolCall::from_raw_arguments("call_1", "f", "[1,2]");
        assert_eq!(converted.warnings.len(), 1);
    }

    #[test]
    fn tool_choice_spellings() {
        assert_eq!(ToolChoice::from_value(&json!("required")), Some(ToolChoice::Any));
        assert_eq!(ToolChoice::from_value(&json!("none")), Some(ToolChoice::None));
        assert_eq!(
            ToolChoice::from_value(&json!({"type":"function","function":{"name":"f"}})),
            Some(ToolChoice::specific("f"))
        );
        assert_eq!(
            ToolChoice::from_value(&json!({"type":"tool","name":"g"})),
            Some(ToolChoice::specific("g"))
        );
        assert_eq!(ToolChoice::from_value(&json!(3)), None);
    }

    #[test]
    fn synthesized_ids_are_unique() {
        assert_ne!(ToolCall::synthesize_id(), ToolCall::synthesize_id());
    }

    #[test]
    fn repeated_ids_are_replaced() {
        let mut calls = vec![
            ToolCall::new("call_1", "a", json!({})),
            ToolCall::new("call_1", "b", json!({})),
            ToolCall::new("", "c", json!({})),
            ToolCall::new("call_2", "d", json!({})),
        ];
        let warnings = ToolCall::dedup_ids(&mut calls);
        assert_eq!(warnings.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_ne!(calls[1].id, "call_1");
        assert!(calls[2].id.starts_with("call_"));
        assert_eq!(calls[3].id, "call_2");
        let unique: HashSet<_> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn tool_call_serializes_name_field() {
        let call = ToolCall::new("c", "f", json!({"a": 1}));
        let v = serde_json::to_value(&call).unwrap();
        assert_eq!(v, json!({"id":"c","name":"f","arguments":{"a":1}}));
        assert_eq!(call.arguments_json(), r#"{"a":1}"#);
    }
}
