use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed generation request, shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendErrorKind {
    Authentication,
    Quota,
    Malformed,
    RateLimited,
    ServerError,
    Unknown,
}

impl BackendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendErrorKind::Authentication => "authentication",
            BackendErrorKind::Quota => "quota",
            BackendErrorKind::Malformed => "malformed",
            BackendErrorKind::RateLimited => "rateLimited",
            BackendErrorKind::ServerError => "serverError",
            BackendErrorKind::Unknown => "unknown",
        }
    }

    /// What the user can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            BackendErrorKind::Authentication => {
                "Check that the API key for this model is correct and has not been revoked."
            }
            BackendErrorKind::Quota => {
                "Top up the provider account or switch to another AI model."
            }
            BackendErrorKind::Malformed => {
                "The request was rejected by the provider. Try a shorter video or another AI model."
            }
            BackendErrorKind::RateLimited => "Wait a minute before trying again.",
            BackendErrorKind::ServerError => {
                "The provider is having trouble right now. Try again later or pick another AI model."
            }
            BackendErrorKind::Unknown => "Try again, or pick another AI model.",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum TldwError {
    #[error("Invalid video reference: {input}")]
    ReferenceInvalid { input: String },

    #[error("Transcript unavailable for {source_key}: {reason}")]
    TranscriptUnavailable { source_key: String, reason: String },

    #[error("{0}")]
    Configuration(String),

    #[error("{provider} is not configured: {env_var} environment variable is not set")]
    BackendUnavailable { provider: String, env_var: String },

    #[error("{provider} request failed ({kind}): {message}")]
    BackendRequestFailed {
        provider: String,
        kind: BackendErrorKind,
        status: Option<u16>,
        message: String,
    },

    #[error("The AI model returned an empty summary")]
    EmptyGenerationResult,

    #[error("A summary for this video, language, mode and model is already being generated")]
    DuplicateRequest,

    #[error("Failed to save summary history: {0}")]
    PersistenceFailure(String),

    #[error("Invalid upload: {0}")]
    UploadInvalid(String),

    #[error("Request cancelled by the consumer")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl TldwError {
    pub fn transcript_unavailable(
        source_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TranscriptUnavailable {
            source_key: source_key.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn upload_invalid(msg: impl Into<String>) -> Self {
        Self::UploadInvalid(msg.into())
    }

    /// Short headline for the user-facing error event.
    pub fn title(&self) -> &'static str {
        match self {
            TldwError::ReferenceInvalid { .. } => "Invalid video URL",
            TldwError::TranscriptUnavailable { .. } => "Could not get a transcript for this video",
            TldwError::Configuration(_) | TldwError::BackendUnavailable { .. } => {
                "Configuration error"
            }
            TldwError::BackendRequestFailed { .. } => "AI model request failed",
            TldwError::EmptyGenerationResult => "The AI model returned an empty summary",
            TldwError::DuplicateRequest => "This summary is already being generated",
            TldwError::PersistenceFailure(_) => "Failed to save summary history",
            TldwError::UploadInvalid(_) => "Invalid subtitle upload",
            TldwError::Cancelled => "Request cancelled",
            TldwError::IoError(_) | TldwError::JsonError(_) | TldwError::ApiError(_) => {
                "Summary generation failed"
            }
        }
    }

    /// Details string; backend failures carry the remediation hint for their kind.
    pub fn details(&self) -> String {
        match self {
            TldwError::BackendRequestFailed { kind, .. } => format!("{} {}", self, kind.hint()),
            TldwError::BackendUnavailable { .. } => {
                format!("{} Add the key to the environment or pick another AI model.", self)
            }
            _ => self.to_string(),
        }
    }

    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            TldwError::BackendRequestFailed { .. } | TldwError::BackendUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TldwError>;
