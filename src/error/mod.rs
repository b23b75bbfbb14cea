//! Error handling
//!
//! Two families live here:
//! - [`LlmError`]: blocking failures returned through `Result`.
//! - [`Warning`]: recovered, non-fatal problems returned next to a best-effort value.
//!
//! Vendor error payloads are classified by [`taxonomy`] into [`ErrorCategory`].

pub mod taxonomy;

pub use taxonomy::{ErrorCategory, UpstreamError, classify_vendor_error};

use serde::Serialize;
use thiserror::Error;

/// Blocking error type for the adapter.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Outgoing request rejected before it leaves the process.
    #[error("invalid {provider} request: {}", errors.join("; "))]
    Validation {
        provider: String,
        errors: Vec<String>,
    },

    /// A vendor payload could not be turned into a well-formed message.
    #[error("format error: {0}")]
    Format(String),

    /// The vendor answered with an error envelope.
    #[error("{0}")]
    UpstreamApi(UpstreamError),

    /// The accumulator was already finalized; each logical stream needs a fresh one.
    #[error("stream accumulator already finalized")]
    StreamFinalized,

    /// No converter is registered under this name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Transport-level failure surfaced by the SSE bridge.
    #[error("stream error: {0}")]
    Stream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Build a validation error for one provider.
    pub fn validation(provider: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Validation {
            provider: provider.into(),
            errors,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Taxonomy category for upstream errors, `None` for local failures.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::UpstreamApi(err) => Some(err.category),
            _ => None,
        }
    }

    /// Validation messages, empty for other variants.
    pub fn validation_errors(&self) -> &[String] {
        match self {
            Self::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl From<UpstreamError> for LlmError {
    fn from(err: UpstreamError) -> Self {
        Self::UpstreamApi(err)
    }
}

/// Non-fatal problem recorded while converting.
///
/// Every warning is also emitted through `tracing::warn!` at the point it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A content block broke a provider constraint and was dropped.
    #[error("content block dropped: {reason}")]
    ContentConstraintViolation { reason: String },

    /// Tool call arguments were not valid JSON; the call keeps empty arguments.
    #[error("malformed arguments for tool call {tool_call_id} ({name}): {reason}")]
    MalformedToolArguments {
        tool_call_id: String,
        name: String,
        reason: String,
    },

    /// A stream event could not be parsed and was skipped.
    #[error("unparseable stream event: {reason}")]
    UnparseableStreamEvent { raw: String, reason: String },

    /// The vendor response did not have the expected shape.
    #[error("response shape: {detail}")]
    ResponseShape { detail: String },

    /// Something was converted lossily.
    #[error("{detail}")]
    Degraded { detail: String },
}

impl Warning {
    pub fn content_violation(reason: impl Into<String>) -> Self {
        Self::ContentConstraintViolation {
            reason: reason.into(),
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self::Degraded {
            detail: detail.into(),
        }
    }

    pub fn response_shape(detail: impl Into<String>) -> Self {
        Self::ResponseShape {
            detail: detail.into(),
        }
    }

    /// Log this warning and hand it back, so call sites can record and push in one step.
    pub fn logged(self) -> Self {
        tracing::warn!("{}", self);
        self
    }
}
