//! Status/code → kind → message tables, one per provider.
//!
//! Rules are matched top to bottom, so code-specific rules sit above the plain status rule for the
//! same status. A response no rule matches keeps the provider's own message with kind `Unknown`.

use serde_json::Value;

use crate::{
    error::{BackendErrorKind, TldwError},
    provider::Provider,
};

#[derive(Debug, Clone, Copy)]
pub struct ErrorRule {
    pub status: u16,
    /// Provider error code, type, status string or reason. `None` matches any.
    pub code: Option<&'static str>,
    pub kind: BackendErrorKind,
    pub message: &'static str,
}

const fn rule(status: u16, kind: BackendErrorKind, message: &'static str) -> ErrorRule {
    ErrorRule {
        status,
        code: None,
        kind,
        message,
    }
}

const fn coded(
    status: u16,
    code: &'static str,
    kind: BackendErrorKind,
    message: &'static str,
) -> ErrorRule {
    ErrorRule {
        status,
        code: Some(code),
        kind,
        message,
    }
}

use BackendErrorKind::*;

pub static OPENAI_ERRORS: &[ErrorRule] = &[
    coded(429, "insufficient_quota", Quota, "Your OpenAI account has run out of credits."),
    coded(
        400,
        "context_length_exceeded",
        Malformed,
        "The transcript is too long for this OpenAI model.",
    ),
    rule(400, Malformed, "OpenAI rejected the request as malformed."),
    rule(401, Authentication, "The OpenAI API key is invalid."),
    rule(403, Authentication, "The OpenAI API key has no access to this model or region."),
    rule(404, Malformed, "The configured OpenAI model does not exist or is not available."),
    rule(429, RateLimited, "OpenAI rate limit reached."),
    rule(500, ServerError, "OpenAI had an internal error."),
    rule(502, ServerError, "OpenAI is temporarily unreachable."),
    rule(503, ServerError, "OpenAI is overloaded."),
];

pub static GROK_ERRORS: &[ErrorRule] = &[
    coded(400, "Incorrect API key provided", Authentication, "The xAI API key is invalid."),
    rule(400, Malformed, "xAI rejected the request as malformed."),
    rule(401, Authentication, "The xAI API key is missing or invalid."),
    rule(403, Quota, "The xAI team has no credits left or no access to this model."),
    rule(404, Malformed, "The configured Grok model does not exist."),
    rule(422, Malformed, "xAI could not process the request parameters."),
    rule(429, RateLimited, "xAI rate limit reached."),
    rule(500, ServerError, "xAI had an internal error."),
    rule(503, ServerError, "xAI is overloaded."),
];

pub static DEEPSEEK_ERRORS: &[ErrorRule] = &[
    rule(400, Malformed, "DeepSeek rejected the request format."),
    rule(401, Authentication, "The DeepSeek API key is invalid."),
    rule(402, Quota, "The DeepSeek account balance is insufficient."),
    rule(422, Malformed, "DeepSeek rejected the request parameters."),
    rule(429, RateLimited, "DeepSeek rate limit reached."),
    rule(500, ServerError, "DeepSeek had an internal error."),
    rule(503, ServerError, "DeepSeek servers are overloaded."),
];

pub static GEMINI_ERRORS: &[ErrorRule] = &[
    coded(400, "API_KEY_INVALID", Authentication, "The Gemini API key is invalid."),
    coded(
        400,
        "FAILED_PRECONDITION",
        Quota,
        "Gemini is not available on the free tier in this region; enable billing.",
    ),
    rule(400, Malformed, "Gemini rejected the request as malformed."),
    rule(403, Authentication, "The Gemini API key does not have the required permissions."),
    rule(404, Malformed, "The configured Gemini model was not found."),
    coded(429, "RESOURCE_EXHAUSTED", RateLimited, "Gemini quota or rate limit exhausted."),
    rule(429, RateLimited, "Gemini rate limit reached."),
    rule(500, ServerError, "Gemini had an internal error."),
    rule(503, ServerError, "Gemini is overloaded or temporarily unavailable."),
    rule(504, ServerError, "Gemini timed out before finishing."),
];

pub fn table_for(provider: Provider) -> &'static [ErrorRule] {
    match provider {
        Provider::Openai => OPENAI_ERRORS,
        Provider::Grok => GROK_ERRORS,
        Provider::Deepseek => DEEPSEEK_ERRORS,
        Provider::Gemini => GEMINI_ERRORS,
    }
}

/// Message and every code-like string found in a provider error body.
#[derive(Debug, Default, PartialEq)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub codes: Vec<String>,
}

impl ErrorBody {
    /// Understands the OpenAI-compatible `{"error": {"message", "type", "code"}}` shape and the
    /// Google `{"error": {"message", "status", "details": [{"reason"}]}}` shape.
    pub fn parse(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };
        let error = match &value["error"] {
            Value::Object(_) => &value["error"],
            Value::String(message) => {
                let mut codes = vec![message.clone()];
                codes.extend(value["code"].as_str().map(str::to_string));
                return Self {
                    message: Some(message.clone()),
                    codes,
                };
            }
            _ => &value,
        };

        let mut codes: Vec<String> = ["code", "type", "status"]
            .iter()
            .filter_map(|field| error[*field].as_str())
            .map(str::to_string)
            .collect();
        if let Some(details) = error["details"].as_array() {
            codes.extend(
                details
                    .iter()
                    .filter_map(|detail| detail["reason"].as_str())
                    .map(str::to_string),
            );
        }

        let message = error["message"].as_str().map(str::to_string);
        if let Some(message) = &message {
            codes.push(message.clone());
        }

        Self { message, codes }
    }
}

pub fn lookup(
    table: &'static [ErrorRule],
    status: u16,
    body: &ErrorBody,
) -> Option<&'static ErrorRule> {
    table.iter().find(|rule| {
        rule.status == status
            && rule.code.is_none_or(|code| {
                body.codes
                    .iter()
                    .any(|candidate| candidate == code || candidate.starts_with(code))
            })
    })
}

/// Classify a non-success HTTP response.
pub fn request_failed(provider: Provider, status: u16, raw_body: &str) -> TldwError {
    let body = ErrorBody::parse(raw_body);
    let (kind, message) = match lookup(table_for(provider), status, &body) {
        Some(rule) => (rule.kind, rule.message.to_string()),
        None => (
            Unknown,
            body.message
                .unwrap_or_else(|| passthrough_message(status, raw_body)),
        ),
    };

    TldwError::BackendRequestFailed {
        provider: provider.name().to_string(),
        kind,
        status: Some(status),
        message,
    }
}

/// Classify a failure that happened before any HTTP status was received.
pub fn transport_failed(provider: Provider, err: reqwest::Error) -> TldwError {
    let kind = if err.is_timeout() || err.is_connect() {
        ServerError
    } else {
        Unknown
    };

    TldwError::BackendRequestFailed {
        provider: provider.name().to_string(),
        kind,
        status: err.status().map(|s| s.as_u16()),
        message: format!("Could not reach {}: {}", provider.name(), err),
    }
}

fn passthrough_message(status: u16, raw_body: &str) -> String {
    let body = raw_body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", crate::format::truncate_chars(body, 300))
    }
}
