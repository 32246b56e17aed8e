use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orchestrator::OrchestratorError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to bind to address: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

/// Wraps `OrchestratorError` with an `IntoResponse` impl, following the teacher's `LlmError`
/// pattern: the orchestrator crate stays free of an axum dependency, so the status/envelope
/// mapping lives here instead.
pub struct ApiError {
    status: StatusCode,
    payload: orchestrator::ErrorPayload,
}

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let payload = error.to_payload(None);

        Self { status, payload }
    }
}

impl ApiError {
    /// Attaches the name of the offending request field to the error envelope.
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.payload.param = Some(param.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        OrchestratorError::InvalidRequest(message.into()).into()
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a orchestrator::ErrorPayload,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorEnvelope { error: &self.payload })).into_response()
    }
}
