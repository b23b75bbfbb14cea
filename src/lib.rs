//! # llm-wire
//!
//! A wire-protocol adapter for chat-completion APIs. It normalizes the request, response
//! and streaming formats of four incompatible vendor families into one message model:
//!
//! - OpenAI chat completions (`providers::openai`)
//! - Anthropic messages (`providers::anthropic`)
//! - Gemini generateContent (`providers::gemini`)
//! - OpenAI Responses (`providers::openai_responses`)
//!
//! The crate performs no IO. Callers hand in resolved parameter maps and already-received
//! payloads or stream events; everything here is synchronous computation, except for the
//! optional SSE bridge in [`streaming::sse`].
//!
//! ```rust,ignore
//! use llm_wire::prelude::*;
//!
//! let adapter = Adapter::builtin();
//! let openai = adapter.converter("openai")?;
//! let body = openai.convert_request(
//!     &[Message::system("Be brief."), Message::human("Hi")],
//!     &ChatParams::new("gpt-4o-mini").with_temperature(0.2),
//! )?;
//! ```
#![deny(unsafe_code)]

pub mod adapter;
pub mod codecs;
pub mod config;
pub mod error;
pub mod providers;
pub mod registry;
pub mod streaming;
pub mod types;
pub mod validation;

pub use adapter::{Adapter, CanonicalInput, TargetFormat};
pub use config::{AdapterConfig, ProviderSettings};
pub use error::{ErrorCategory, LlmError, UpstreamError, Warning};
pub use providers::{ProviderConverter, ProviderKind};
pub use registry::ConverterRegistry;
pub use types::*;

/// Commonly used items.
pub mod prelude {
    pub use crate::adapter::{Adapter, CanonicalInput, TargetFormat};
    pub use crate::error::{ErrorCategory, LlmError, UpstreamError, Warning};
    pub use crate::providers::{ProviderConverter, ProviderKind};
    pub use crate::streaming::{StreamInput, StreamSession};
    pub use crate::types::{
        ChatParams, ChatRecord, ContentBlock, Converted, FinishReason, Message, MessageContent,
        MessageKind, ToolCall, ToolChoice, ToolDefinition, Usage,
    };
}
