//! Error types for the lead-intake desk
//!
//! Maps internal errors to stable API error codes. Messages that leave the
//! process (API bodies, failed lead cards) pass through sanitization first,
//! since provider errors can echo request URLs and headers.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for desk operations
#[derive(Debug, Error)]
pub enum LeadError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Lead not found: {0}")]
    LeadNotFound(Uuid),

    #[error("Cannot {action} a lead in status {status}")]
    InvalidTransition { action: String, status: String },

    #[error("LLM provider error: {message}")]
    LlmError { message: String },

    #[error("{message}")]
    InvalidModelOutput { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Tool error: {0}")]
    ToolError(#[from] crate::tools::ToolError),
}

/// Stable error codes exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    InvalidTransition,
    LlmError,
    InvalidModelOutput,
    ToolError,
    InternalError,
}

/// Error payload returned to API clients
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

impl LeadError {
    /// Error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            LeadError::InvalidInput { .. } => ErrorCode::InvalidInput,
            LeadError::LeadNotFound(_) => ErrorCode::NotFound,
            LeadError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            LeadError::LlmError { .. } => ErrorCode::LlmError,
            LeadError::InvalidModelOutput { .. } => ErrorCode::InvalidModelOutput,
            LeadError::ToolError(_) => ErrorCode::ToolError,
            LeadError::InternalError { .. } | LeadError::ConfigError(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self.code() {
            ErrorCode::InvalidInput => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::InvalidTransition => 409,
            ErrorCode::LlmError | ErrorCode::InvalidModelOutput => 502,
            ErrorCode::ToolError | ErrorCode::InternalError => 500,
        }
    }

    /// Convert to the API error body
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetails {
                code: self.code(),
                message: self.public_message(),
            },
        }
    }

    /// Sanitized message safe to show to users
    pub fn public_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create invalid transition error
    pub fn invalid_transition<S: Into<String>>(action: S, status: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            action: action.into(),
            status: status.to_string(),
        }
    }

    /// Create LLM error
    pub fn llm_error<S: Into<String>>(message: S) -> Self {
        Self::LlmError {
            message: message.into(),
        }
    }

    /// Create invalid model output error
    pub fn invalid_model_output<S: Into<String>>(message: S) -> Self {
        Self::InvalidModelOutput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

impl From<crate::llm::provider::LlmError> for LeadError {
    fn from(e: crate::llm::provider::LlmError) -> Self {
        Self::llm_error(e.to_string())
    }
}

/// Sanitize error messages to prevent sensitive data leakage
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    // Remove common secret patterns, including key= query parameters
    if let Ok(secret_pattern) = regex::Regex::new(r"(?i)(password|token|key|secret)[=:]\s*[^\s&]+") {
        sanitized = secret_pattern
            .replace_all(&sanitized, "${1}=***")
            .to_string();
    }

    // Remove bearer credentials echoed back in error bodies
    if let Ok(bearer_pattern) = regex::Regex::new(r"(?i)bearer\s+[A-Za-z0-9._\-]+") {
        sanitized = bearer_pattern
            .replace_all(&sanitized, "Bearer ***")
            .to_string();
    }

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for desk operations
pub type LeadResult<T> = Result<T, LeadError>;
