//! Structural checks on tool definitions and tool choice

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ValidationResult;
use crate::types::{ChatParams, ToolChoice, param_keys};

/// Letters, digits, `_` and `-`, 1 to 64 characters.
pub static STRICT_TOOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").expect("valid tool name pattern")
});

/// Gemini function names: must start with a letter or `_`, dots allowed.
pub static GEMINI_TOOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_.-]{0,63}$").expect("valid tool name pattern")
});

/// Check the raw `tools` parameter.
///
/// Entries may be canonical `{name, description, parameters}` or OpenAI-wrapped
/// `{type:"function", function:{...}}`. With `name_pattern` unset only non-empty names
/// are required.
pub fn check_tools(
    params: &ChatParams,
    name_pattern: Option<&Regex>,
    result: &mut ValidationResult,
) {
    let Some(tools) = params.get(param_keys::TOOLS) else {
        return;
    };
    let Some(items) = tools.as_array() else {
        result.error("tools must be an array");
        return;
    };

    let mut seen = HashSet::new();
    for (i, item) in items.iter().enumerate() {
        let def = item.get("function").unwrap_or(item);
        let Some(name) = def.get("name").and_then(Value::as_str) else {
            result.error(format!("tools[{i}] is missing a name"));
            continue;
        };
        if name.is_empty() {
            result.error(format!("tools[{i}] has an empty name"));
            continue;
        }
        if let Some(pattern) = name_pattern
            && !pattern.is_match(name)
        {
            result.error(format!(
                "tool name '{name}' must match {}",
                pattern.as_str()
            ));
        }
        if !seen.insert(name) {
            result.error(format!("duplicate tool name '{name}'"));
        }
        if def.get("description").and_then(Value::as_str).is_none_or(str::is_empty) {
            result.warn(format!("tool '{name}' has no description"));
        }
        if let Some(schema) = def.get("parameters") {
            check_schema(name, schema, result);
        }
    }
}

fn check_schema(name: &str, schema: &Value, result: &mut ValidationResult) {
    let Some(obj) = schema.as_object() else {
        result.error(format!("tool '{name}' parameters must be an object"));
        return;
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("object") => {}
        Some(other) => result.error(format!(
            "tool '{name}' parameters must have type 'object', got '{other}'"
        )),
        None => result.error(format!("tool '{name}' parameters must declare type 'object'")),
    }
    if let Some(props) = obj.get("properties")
        && !props.is_object()
    {
        result.error(format!("tool '{name}' parameters.properties must be an object"));
    }
    match obj.get("required") {
        None => {}
        Some(Value::Array(required)) => {
            for field in required {
                match field.as_str() {
                    None => result.error(format!(
                        "tool '{name}' parameters.required must list strings"
                    )),
                    Some(field)
                        if obj
                            .get("properties")
                            .and_then(Value::as_object)
                            .is_some_and(|p| !p.contains_key(field)) =>
                    {
                        result.warn(format!(
                            "tool '{name}' requires '{field}' which is not in properties"
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        Some(_) => result.error(format!("tool '{name}' parameters.required must be an array")),
    }
}

/// A specific tool choice must name a defined tool; any non-`None` choice needs tools.
pub fn check_tool_choice(params: &ChatParams, result: &mut ValidationResult) {
    let Some(raw) = params.get(param_keys::TOOL_CHOICE) else {
        return;
    };
    let Some(choice) = ToolChoice::from_value(raw) else {
        result.error(format!("tool_choice {raw} is not recognized"));
        return;
    };
    let tools = params.tools();
    match choice {
        ToolChoice::Specific { name } if !tools.iter().any(|t| t.name == name) => {
            result.error(format!("tool_choice names '{name}' which is not among the tools"))
        }
        ToolChoice::Any if tools.is_empty() => {
            result.error("tool_choice requires a tool call but no tools are defined")
        }
        _ => {}
    }
}
