//! Request and response validation
//!
//! Request validation is blocking: a non-empty error list turns into
//! [`LlmError::Validation`] before anything is encoded. Response validation is advisory:
//! its findings are logged and attached to the converted message as warnings.

pub mod messages;
pub mod response;
pub mod rules;
pub mod tools;

pub use rules::{Condition, ParameterProfile, RangeMode, Rule, ValueKind};

use serde::Serialize;
use serde_json::Value;

use crate::error::{LlmError, Warning};
use crate::types::{ChatParams, Message};

/// Outcome of a validation pass. Errors and warnings keep the order they were found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Blocking interpretation: errors fail, warnings are logged and handed back.
    pub fn into_request_result(self, provider: &str) -> Result<Vec<Warning>, LlmError> {
        if !self.is_valid {
            tracing::debug!(provider, errors = ?self.errors, "request rejected");
            return Err(LlmError::validation(provider, self.errors));
        }
        Ok(self.into_warnings())
    }

    /// Advisory interpretation: everything becomes a logged warning.
    pub fn into_warnings(self) -> Vec<Warning> {
        self.errors
            .into_iter()
            .chain(self.warnings)
            .map(|w| Warning::response_shape(w).logged())
            .collect()
    }
}

/// Blocking checks on an outgoing request.
pub trait RequestValidator: Send + Sync {
    fn validate_request(&self, messages: &[Message], params: &ChatParams) -> ValidationResult;
}

/// Advisory checks on a vendor response body.
pub trait ResponseValidator: Send + Sync {
    fn validate_response(&self, response: &Value) -> ValidationResult;
}
