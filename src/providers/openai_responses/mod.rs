//! OpenAI Responses API
//!
//! Request: `{model, input: string | [items], reasoning?, text?, tools?,
//! previous_response_id?}`; response: native `{output:[items], status, usage}` or the
//! chat-compatible `{choices, reasoning?}`; streaming: typed `response.*` events.

pub mod content;
pub mod converter;
pub mod streaming;
pub mod tools;
pub mod validation;

pub use content::ResponsesContentCodec;
pub use converter::OpenAiResponsesConverter;
pub use streaming::ResponsesStreamReconstructor;
pub use tools::ResponsesToolCodec;
pub use validation::ResponsesValidator;
