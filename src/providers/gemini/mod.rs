//! Google Gemini `generateContent`
//!
//! Request: `{contents:[{role, parts}], systemInstruction?, generationConfig?, tools?,
//! toolConfig?}`; response: `{candidates:[{content:{parts}, finishReason}], usageMetadata}`;
//! streaming: the same response shape, one partial chunk per SSE frame.

pub mod content;
pub mod converter;
pub mod streaming;
pub mod tools;
pub mod validation;

pub use content::GeminiContentCodec;
pub use converter::{
    GeminiConversation, GeminiConverter, THINKING_BUDGETS, supports_system_instruction,
};
pub use streaming::GeminiStreamReconstructor;
pub use tools::GeminiToolCodec;
pub use validation::{GEMINI_MODEL_PREFIXES, GeminiValidator};
