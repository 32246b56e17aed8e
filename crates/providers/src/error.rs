use thiserror::Error;

/// Errors a [`crate::ProviderAdapter`] can return.
///
/// Mirrors the shape of the teacher's `LlmError`: each variant carries the information an HTTP
/// layer needs to pick a status code, without depending on any HTTP crate itself.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The upstream rejected our credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The request was malformed in a way the upstream could detect.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested model is not known to the upstream.
    #[error("{0}")]
    ModelNotFound(String),

    /// The upstream is throttling us.
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// The upstream's own rate-limit message, if any.
        message: String,
    },

    /// The upstream returned a non-2xx status we don't special-case.
    #[error("Provider API error ({status}): {message}")]
    ProviderApiError {
        /// The HTTP status code returned by the upstream.
        status: u16,
        /// The upstream's error body, as text.
        message: String,
    },

    /// We could not reach the upstream at all.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Something went wrong on our side translating to/from the wire format.
    ///
    /// `Some(message)` came from the provider and is safe to surface; `None` means an internal
    /// bug and the caller should not leak details to the client.
    #[error("Internal provider error")]
    InternalError(Option<String>),

    /// The call was torn down mid-stream by the caller's cancellation signal rather than by the
    /// upstream reporting an error. The orchestrator's streaming path handles this distinctly
    /// from every other variant: it writes an `incomplete` row instead of a `failed` one and
    /// emits no `error`/`response.failed` event, only `[DONE]`.
    #[error("aborted")]
    Aborted,
}

/// Convenience alias for fallible provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
