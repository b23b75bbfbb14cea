//! Canonical data model shared by every converter.

pub mod converted;
pub mod message;
pub mod params;
pub mod record;
pub mod tools;
pub mod usage;

pub use converted::Converted;
pub use message::{ContentBlock, ImageSource, Message, MessageContent, MessageKind, metadata_keys};
pub use params::{ChatParams, keys as param_keys};
pub use record::{ChatRecord, RoleKind};
pub use tools::{ToolCall, ToolChoice, ToolDefinition};
pub use usage::{FinishReason, Usage};

/// Open string-keyed metadata attached to messages.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
