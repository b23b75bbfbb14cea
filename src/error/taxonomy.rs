//! Vendor error taxonomy
//!
//! Every provider reports failures with an envelope shaped roughly like
//! `{ "error": { "type": "...", "message": "...", "code": ... } }`. Gemini uses `status`
//! instead of `type` and a numeric `code`. Each provider supplies a dictionary from its own
//! type strings to an [`ErrorCategory`]; anything not in the dictionary is classified by
//! the numeric code when one is present, and otherwise lands in `Unknown` with the raw
//! type preserved.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Fixed set of categories all vendor errors map into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidRequest,
    AuthFailure,
    PermissionDenied,
    NotFound,
    RateLimited,
    ServerError,
    Overloaded,
    Unknown,
}

impl ErrorCategory {
    /// Human-readable label used in rendered messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid request",
            Self::AuthFailure => "authentication failed",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::Overloaded => "service overloaded",
            Self::Unknown => "unknown error",
        }
    }

    /// Best-effort category for an HTTP-like status code.
    pub fn from_status(code: u64) -> Self {
        match code {
            400 | 413 | 422 => Self::InvalidRequest,
            401 => Self::AuthFailure,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            503 | 529 => Self::Overloaded,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A vendor error envelope mapped into the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamError {
    pub provider: String,
    pub category: ErrorCategory,
    /// Raw vendor `type` (or `status`), kept even when the category is `Unknown`.
    pub vendor_type: Option<String>,
    pub message: String,
    pub code: Option<String>,
}

impl UpstreamError {
    /// One-line description suitable for logs and user-facing surfaces.
    pub fn describe(&self) -> String {
        let mut out = format!("{} {}: {}", self.provider, self.category, self.message);
        if let (Some(raw), ErrorCategory::Unknown) = (&self.vendor_type, self.category) {
            out.push_str(&format!(" (type: {raw})"));
        }
        if let Some(code) = &self.code {
            out.push_str(&format!(" [code {code}]"));
        }
        out
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Vendor type string → category table.
pub type ErrorDictionary = &'static [(&'static str, ErrorCategory)];

/// OpenAI chat completions (also used by OpenAI-compatible servers).
pub const OPENAI_ERRORS: ErrorDictionary = &[
    ("invalid_request_error", ErrorCategory::InvalidRequest),
    ("invalid_api_key", ErrorCategory::AuthFailure),
    ("authentication_error", ErrorCategory::AuthFailure),
    ("permission_error", ErrorCategory::PermissionDenied),
    ("not_found_error", ErrorCategory::NotFound),
    ("model_not_found", ErrorCategory::NotFound),
    ("rate_limit_error", ErrorCategory::RateLimited),
    ("insufficient_quota", ErrorCategory::RateLimited),
    ("tokens", ErrorCategory::RateLimited),
    ("requests", ErrorCategory::RateLimited),
    ("server_error", ErrorCategory::ServerError),
    ("api_error", ErrorCategory::ServerError),
    ("overloaded_error", ErrorCategory::Overloaded),
    ("service_unavailable", ErrorCategory::Overloaded),
];

/// Anthropic messages API.
pub const ANTHROPIC_ERRORS: ErrorDictionary = &[
    ("invalid_request_error", ErrorCategory::InvalidRequest),
    ("request_too_large", ErrorCategory::InvalidRequest),
    ("authentication_error", ErrorCategory::AuthFailure),
    ("permission_error", ErrorCategory::PermissionDenied),
    ("not_found_error", ErrorCategory::NotFound),
    ("rate_limit_error", ErrorCategory::RateLimited),
    ("api_error", ErrorCategory::ServerError),
    ("overloaded_error", ErrorCategory::Overloaded),
];

/// Gemini reports canonical gRPC status names.
pub const GEMINI_ERRORS: ErrorDictionary = &[
    ("INVALID_ARGUMENT", ErrorCategory::InvalidRequest),
    ("FAILED_PRECONDITION", ErrorCategory::InvalidRequest),
    ("OUT_OF_RANGE", ErrorCategory::InvalidRequest),
    ("UNAUTHENTICATED", ErrorCategory::AuthFailure),
    ("PERMISSION_DENIED", ErrorCategory::PermissionDenied),
    ("NOT_FOUND", ErrorCategory::NotFound),
    ("RESOURCE_EXHAUSTED", ErrorCategory::RateLimited),
    ("INTERNAL", ErrorCategory::ServerError),
    ("UNKNOWN", ErrorCategory::ServerError),
    ("DEADLINE_EXCEEDED", ErrorCategory::ServerError),
    ("UNAVAILABLE", ErrorCategory::Overloaded),
];

/// OpenAI Responses API; shares most types with chat completions.
pub const RESPONSES_ERRORS: ErrorDictionary = &[
    ("invalid_request_error", ErrorCategory::InvalidRequest),
    ("invalid_prompt", ErrorCategory::InvalidRequest),
    ("authentication_error", ErrorCategory::AuthFailure),
    ("invalid_api_key", ErrorCategory::AuthFailure),
    ("permission_error", ErrorCategory::PermissionDenied),
    ("not_found_error", ErrorCategory::NotFound),
    ("rate_limit_exceeded", ErrorCategory::RateLimited),
    ("rate_limit_error", ErrorCategory::RateLimited),
    ("insufficient_quota", ErrorCategory::RateLimited),
    ("server_error", ErrorCategory::ServerError),
    ("vector_store_timeout", ErrorCategory::ServerError),
    ("overloaded_error", ErrorCategory::Overloaded),
];

fn lookup(dictionary: ErrorDictionary, vendor_type: &str) -> Option<ErrorCategory> {
    dictionary
        .iter()
        .find(|(name, _)| *name == vendor_type)
        .map(|(_, category)| *category)
}

fn code_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Classify a vendor error payload.
///
/// Returns `None` when `payload` carries no error envelope. Accepts the envelope itself or a
/// stream event wrapping it (`{"type":"error","error":{...}}`).
pub fn classify_vendor_error(
    provider: &str,
    dictionary: ErrorDictionary,
    payload: &Value,
) -> Option<UpstreamError> {
    let error_obj = payload.get("error")?;

    // Some servers send `{"error": "message"}`.
    if let Some(message) = error_obj.as_str() {
        return Some(UpstreamError {
            provider: provider.to_string(),
            category: ErrorCategory::Unknown,
            vendor_type: None,
            message: message.to_string(),
            code: None,
        });
    }
    if !error_obj.is_object() {
        return None;
    }

    let message = error_obj
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("no message provided")
        .to_string();
    let vendor_type = error_obj
        .get("type")
        .and_then(|v| v.as_str())
        .or_else(|| error_obj.get("status").and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let code = error_obj.get("code").and_then(code_to_string);

    let category = vendor_type
        .as_deref()
        .and_then(|t| lookup(dictionary, t))
        .or_else(|| code.as_deref().and_then(|c| lookup(dictionary, c)))
        .or_else(|| {
            error_obj
                .get("code")
                .and_then(|c| c.as_u64())
                .map(ErrorCategory::from_status)
        })
        .unwrap_or(ErrorCategory::Unknown);

    Some(UpstreamError {
        provider: provider.to_string(),
        category,
        vendor_type,
        message,
        code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_limit_maps_and_keeps_message() {
        let payload = json!({"error":{"type":"rate_limit_error","message":"slow down"}});
        let err = classify_vendor_error("anthropic", ANTHROPIC_ERRORS, &payload).unwrap();
        assert_eq!(err.category, ErrorCategory::RateLimited);
        assert!(err.describe().contains("slow down"));
        assert!(err.describe().contains("rate limited"));
    }

    #[test]
    fn unknown_type_is_preserved() {
        let payload = json!({"error":{"type":"teapot_error","message":"short and stout"}});
        let err = classify_vendor_error("openai", OPENAI_ERRORS, &payload).unwrap();
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(err.vendor_type.as_deref(), Some("teapot_error"));
        assert!(err.describe().contains("teapot_error"));
    }

    #[test]
    fn gemini_status_and_numeric_code() {
        let payload = json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        });
        let err = classify_vendor_error("gemini", GEMINI_ERRORS, &payload).unwrap();
        assert_eq!(err.category, ErrorCategory::RateLimited);
        assert_eq!(err.code.as_deref(), Some("429"));
    }

    #[test]
    fn falls_back_to_numeric_code() {
        let payload = json!({"error":{"code":503,"message":"try later"}});
        let err = classify_vendor_error("gemini", GEMINI_ERRORS, &payload).unwrap();
        assert_eq!(err.category, ErrorCategory::Overloaded);
    }

    #[test]
    fn openai_code_field_is_consulted() {
        let payload = json!({"error":{"type":null,"code":"insufficient_quota","message":"quota"}});
        let err = classify_vendor_error("openai", OPENAI_ERRORS, &payload).unwrap();
        assert_eq!(err.category, ErrorCategory::RateLimited);
    }

    #[test]
    fn non_envelope_returns_none() {
        assert!(classify_vendor_error("openai", OPENAI_ERRORS, &json!({"message":"x"})).is_none());
    }

    #[test]
    fn string_error_is_unknown() {
        let err =
            classify_vendor_error("openai", OPENAI_ERRORS, &json!({"error":"boom"})).unwrap();
        assert_eq!(err.category, ErrorCategory::Unknown);
        assert_eq!(err.message, "boom");
    }
}
