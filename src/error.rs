//! Error types for modelfall.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::router::Provider;

/// Result type alias for modelfall operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a provider returned a successful HTTP response without any text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// Generation stopped at the output token cap before producing text.
    Truncated,
    /// The prompt or the candidate was blocked by the provider's safety filters.
    ContentFiltered,
    /// The provider returned no candidates or an empty message.
    NoContent,
}

impl EmptyReason {
    /// Short tag used in headers and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmptyReason::Truncated => "truncated",
            EmptyReason::ContentFiltered => "content_filtered",
            EmptyReason::NoContent => "no_content",
        }
    }
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            EmptyReason::Truncated => "output was truncated at the token limit",
            EmptyReason::ContentFiltered => "response was blocked by the content filter",
            EmptyReason::NoContent => "response contained no content",
        };
        f.write_str(text)
    }
}

/// Main error type for modelfall.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Unsupported provider in selection '{selection}'")]
    UnsupportedProvider { selection: String },

    #[error("Model '{model}' is not in the {provider} catalog")]
    UnknownModel { provider: Provider, model: String },

    #[error("{provider} model '{model}' request failed{}: {message}", status_suffix(.status))]
    Transport {
        provider: Provider,
        model: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} model '{model}' returned an empty response: {reason}")]
    EmptyResponse {
        provider: Provider,
        model: String,
        reason: EmptyReason,
    },

    #[error("Failed to extract JSON from model output: {0}")]
    Parse(String),

    #[error(
        "Generation with {provider} exceeded the {deadline_ms}ms deadline while calling '{model}' after {attempts} failed attempt(s){}",
        last_error_suffix(.last_error)
    )]
    DeadlineExceeded {
        provider: Provider,
        /// Model whose attempt was cut off.
        model: String,
        deadline_ms: u64,
        attempts: usize,
        /// Message of the most recent failed attempt, if any.
        last_error: Option<String>,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(message) => format!("; last error: {}", message),
        None => String::new(),
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with HTTP {}", code),
        None => String::new(),
    }
}

impl Error {
    /// Whether advancing to the next catalog model may help.
    ///
    /// Transport failures and empty responses are model-specific and retried;
    /// input errors and extraction failures are surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::EmptyResponse { .. })
    }

    /// Short outcome tag for attempt records ("503", "network", "empty", ...).
    pub fn outcome_tag(&self) -> String {
        match self {
            Error::Transport {
                status: Some(code), ..
            } => code.to_string(),
            Error::Transport { status: None, .. } => "network".to_string(),
            Error::EmptyResponse { reason, .. } => reason.as_str().to_string(),
            Error::UnsupportedProvider { .. } | Error::UnknownModel { .. } => {
                "rejected".to_string()
            }
            Error::Parse(_) => "parse".to_string(),
            Error::DeadlineExceeded { .. } => "deadline".to_string(),
            _ => "error".to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::UnsupportedProvider { .. }
            | Error::UnknownModel { .. }
            | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Transport { .. } | Error::EmptyResponse { .. } | Error::Parse(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Config(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::UnsupportedProvider { .. } => "unsupported_provider",
            Error::UnknownModel { .. } => "unknown_model",
            Error::Transport { .. } => "transport_failure",
            Error::EmptyResponse { .. } => "empty_response",
            Error::Parse(_) => "parse_failure",
            Error::DeadlineExceeded { .. } => "deadline_exceeded",
            Error::BadRequest(_) => "bad_request",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut error = serde_json::json!({
            "message": self.to_string(),
            "type": self.error_type(),
            "code": status.as_u16()
        });

        match &self {
            Error::Transport {
                provider, model, ..
            }
            | Error::EmptyResponse {
                provider, model, ..
            }
            | Error::UnknownModel { provider, model }
            | Error::DeadlineExceeded {
                provider, model, ..
            } => {
                error["provider"] = serde_json::json!(provider.as_str());
                error["model"] = serde_json::json!(model);
            }
            _ => {}
        }

        if let Error::EmptyResponse { reason, .. } = &self {
            error["reason"] = serde_json::json!(reason.as_str());
        }

        (status, axum::Json(serde_json::json!({ "error": error }))).into_response()
    }
}
