//! Shared helpers for the integration tests
//!
//! - `stream_fixture`: load recorded `.sse` files and replay them through a converter
//! - message comparison that ignores ids synthesized per replay

#![allow(dead_code)]

pub mod stream_fixture;

use llm_wire::Message;

/// Assert two reconstructed messages carry the same content.
///
/// Tool call ids are compared only when the vendor supplied them; ids synthesized for
/// unnamed calls differ between replays.
pub fn assert_same_reconstruction(left: &Message, right: &Message, label: &str) {
    assert_eq!(left.text(), right.text(), "{label}: text");
    assert_eq!(left.reasoning(), right.reasoning(), "{label}: reasoning");
    assert_eq!(left.usage(), right.usage(), "{label}: usage");
    assert_eq!(left.finish_reason(), right.finish_reason(), "{label}: finish reason");
    assert_eq!(left.model(), right.model(), "{label}: model");
    assert_eq!(left.warnings(), right.warnings(), "{label}: warnings");

    let (lhs, rhs) = (left.tool_calls(), right.tool_calls());
    assert_eq!(lhs.len(), rhs.len(), "{label}: tool call count");
    for (a, b) in lhs.iter().zip(rhs) {
        assert_eq!(a.function_name, b.function_name, "{label}: tool name");
        assert_eq!(a.arguments, b.arguments, "{label}: tool arguments");
        assert!(!a.id.is_empty() && !b.id.is_empty(), "{label}: tool call id");
    }
}
