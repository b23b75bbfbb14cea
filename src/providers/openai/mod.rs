//! OpenAI chat completions
//!
//! Request: `{model, messages, tools?, tool_choice?, ...}`; response:
//! `{choices:[{message}], usage}`; streaming: `data: <chunk>` frames ending in `[DONE]`.

pub mod content;
pub mod converter;
pub mod streaming;
pub mod tools;
pub mod validation;

pub use content::OpenAiContentCodec;
pub use converter::{OpenAiConverter, is_reasoning_model};
pub use streaming::OpenAiStreamReconstructor;
pub use tools::OpenAiToolCodec;
pub use validation::{OPENAI_MODEL_PREFIXES, OpenAiValidator};
