//! Orchestrator-level errors.
//!
//! This crate has no axum dependency (see the "ambient layering" design note), so unlike the
//! teacher's `LlmError` there is no `IntoResponse` impl here — `status_code()`/`error_type()`
//! give the HTTP crate everything it needs to build one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("{0}")]
    ServerError(String),
}

impl OrchestratorError {
    /// The HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            OrchestratorError::InvalidRequest(_) => 400,
            OrchestratorError::NotFound(_) => 404,
            OrchestratorError::Conflict(_) => 409,
            OrchestratorError::RateLimitExceeded(_) => 429,
            OrchestratorError::NotImplemented(_) => 501,
            OrchestratorError::ServerError(_) => 500,
        }
    }

    /// The wire `error.type` value.
    pub fn error_type(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidRequest(_) => "invalid_request_error",
            OrchestratorError::NotFound(_) => "not_found",
            OrchestratorError::Conflict(_) => "conflict",
            OrchestratorError::RateLimitExceeded(_) => "rate_limit_error",
            OrchestratorError::NotImplemented(_) => "not_implemented",
            OrchestratorError::ServerError(_) => "server_error",
        }
    }

    /// Builds the wire error envelope's inner payload for this error.
    pub fn to_payload(&self, param: Option<String>) -> ErrorPayload {
        ErrorPayload {
            message: self.to_string(),
            kind: self.error_type().to_string(),
            param,
            code: None,
        }
    }
}

impl From<providers::ProviderError> for OrchestratorError {
    fn from(error: providers::ProviderError) -> Self {
        match error {
            providers::ProviderError::AuthenticationFailed(m) => OrchestratorError::ServerError(m),
            providers::ProviderError::InvalidRequest(m) => OrchestratorError::InvalidRequest(m),
            providers::ProviderError::ModelNotFound(m) => OrchestratorError::NotFound(m),
            providers::ProviderError::RateLimitExceeded { message } => OrchestratorError::RateLimitExceeded(message),
            providers::ProviderError::ProviderApiError { status, message } => {
                OrchestratorError::ServerError(format!("provider returned {status}: {message}"))
            }
            providers::ProviderError::ConnectionError(m) => OrchestratorError::ServerError(m),
            providers::ProviderError::InternalError(m) => {
                OrchestratorError::ServerError(m.unwrap_or_else(|| "internal provider error".to_string()))
            }
            providers::ProviderError::Aborted => OrchestratorError::ServerError("aborted".to_string()),
        }
    }
}

/// The `error` object inside a wire error envelope or a failed response object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub param: Option<String>,
    pub code: Option<String>,
}
