use std::collections::HashSet;

use super::ValidationResult;
use crate::types::Message;

/// Conversation checks shared by every provider.
pub fn check_messages(messages: &[Message], result: &mut ValidationResult) {
    if messages.is_empty() {
        result.error("at least one message is required");
        return;
    }

    let mut call_ids = HashSet::new();
    for (i, message) in messages.iter().enumerate() {
        if message.content.is_empty() && message.tool_calls().is_empty() && !message.is_tool() {
            result.warn(format!("messages[{i}] ({}) has empty content", message.role_name()));
        }
        if let Some(id) = message.tool_call_id()
            && id.trim().is_empty()
        {
            result.error(format!("messages[{i}] is a tool result without tool_call_id"));
        }

        let mut local_ids = HashSet::new();
        for call in message.tool_calls() {
            if call.function_name.is_empty() {
                result.error(format!("messages[{i}] has a tool call without a name"));
            }
            if !local_ids.insert(call.id.as_str()) {
                result.error(format!(
                    "messages[{i}] repeats tool call id '{}'",
                    call.id
                ));
            }
            call_ids.insert(call.id.as_str());
        }
    }

    for (i, message) in messages.iter().enumerate() {
        if let Some(id) = message.tool_call_id()
            && !call_ids.contains(id)
        {
            result.warn(format!(
                "messages[{i}] answers tool call '{id}' which no assistant message issued"
            ));
        }
    }
}

/// At least one non-system turn must remain once system messages are lifted out.
pub fn check_has_conversation(messages: &[Message], result: &mut ValidationResult) {
    if !messages.is_empty() && messages.iter().all(Message::is_system) {
        result.error("at least one non-system message is required");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::json;

    #[test]
    fn empty_conversation_is_rejected() {
        let mut result = ValidationResult::new();
        check_messages(&[], &mut result);
        assert!(!result.is_valid);
    }

    #[test]
    fn repeated_call_ids_are_rejected() {
        let call = ToolCall::new("call_1", "f", json!({}));
        let messages = vec![
            Message::human("go"),
            Message::ai_with_tool_calls("", vec![call.clone(), call]),
        ];
        let mut result = ValidationResult::new();
        check_messages(&messages, &mut result);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("call_1"));
    }

    #[test]
    fn orphan_tool_result_is_a_warning() {
        let messages = vec![Message::human("go"), Message::tool("call_x", "42")];
        let mut result = ValidationResult::new();
        check_messages(&messages, &mut result);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn system_only_conversation() {
        let mut result = ValidationResult::new();
        check_has_conversation(&[Message::system("rules")], &mut result);
        assert!(!result.is_valid);
    }
}
