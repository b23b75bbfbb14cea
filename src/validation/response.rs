//! Structural helpers for advisory response validation

use serde_json::Value;

use super::ValidationResult;

/// The response must be a JSON object.
pub fn require_object<'a>(
    response: &'a Value,
    result: &mut ValidationResult,
) -> Option<&'a serde_json::Map<String, Value>> {
    let obj = response.as_object();
    if obj.is_none() {
        result.error(format!("response must be a JSON object, got {}", kind_of(response)));
    }
    obj
}

/// `field` must be a non-empty array; returns it when it is.
pub fn require_array<'a>(
    parent: &'a Value,
    field: &str,
    path: &str,
    result: &mut ValidationResult,
) -> Option<&'a Vec<Value>> {
    match parent.get(field) {
        None | Some(Value::Null) => {
            result.error(format!("{path}{field} is missing"));
            None
        }
        Some(Value::Array(items)) if items.is_empty() => {
            result.error(format!("{path}{field} is empty"));
            None
        }
        Some(Value::Array(items)) => Some(items),
        Some(other) => {
            result.error(format!("{path}{field} must be an array, got {}", kind_of(other)));
            None
        }
    }
}

/// `field`, when present, must be an object.
pub fn expect_object(parent: &Value, field: &str, path: &str, result: &mut ValidationResult) {
    if let Some(value) = parent.get(field)
        && !value.is_object()
        && !value.is_null()
    {
        result.error(format!("{path}{field} must be an object, got {}", kind_of(value)));
    }
}

/// Usage counters, when present, must be non-negative integers.
pub fn check_usage(
    usage: Option<&Value>,
    counters: &[&str],
    path: &str,
    result: &mut ValidationResult,
) {
    let Some(usage) = usage.filter(|u| !u.is_null()) else {
        return;
    };
    if !usage.is_object() {
        result.error(format!("{path} must be an object, got {}", kind_of(usage)));
        return;
    }
    for counter in counters {
        if let Some(value) = usage.get(*counter)
            && !value.is_u64()
        {
            result.error(format!(
                "{path}.{counter} must be a non-negative integer, got {value}"
            ));
        }
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_and_mistyped_fields() {
        let mut result = ValidationResult::new();
        let response = json!({
            "choices": {},
            "usage": {"prompt_tokens": "ten", "completion_tokens": 3}
        });
        require_object(&response, &mut result);
        require_array(&response, "choices", "", &mut result);
        check_usage(
            response.get("usage"),
            &["prompt_tokens", "completion_tokens"],
            "usage",
            &mut result,
        );
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("choices must be an array"));
        assert!(result.errors[1].contains("usage.prompt_tokens"));
    }

    #[test]
    fn non_object_response() {
        let mut result = ValidationResult::new();
        assert!(require_object(&json!([1]), &mut result).is_none());
        assert!(result.errors[0].contains("array"));
    }
}
