//! HTTP handlers for the Responses API surface: `/v1/responses*` and `/v1/models*`.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use orchestrator::{CreateOutcome, OrchestratorService, Resolver};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<OrchestratorService>,
    pub resolver: Arc<Resolver>,
    /// Parent token for graceful shutdown. Per-request cancellation tokens are derived as child
    /// tokens of this one, so a shutdown also tears down every in-flight stream.
    pub shutdown_signal: CancellationToken,
}

/// The protected subtree: everything but model listing, gated by [`crate::auth::AuthLayer`] in
/// `lib.rs`.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/v1/responses", post(create_response))
        .route("/v1/responses/compact", post(compact_response))
        .route("/v1/responses/{id}", get(get_response).delete(delete_response))
        .route("/v1/responses/{id}/cancel", post(cancel_response))
}

/// The public subtree: model discovery, reachable without a bearer token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/models/{id}", get(get_model))
}

fn require_json_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.split(';').next().unwrap_or("").trim() == "application/json");

    if is_json {
        Ok(())
    } else {
        Err(ApiError::bad_request("Content-Type must be application/json").with_param("content-type"))
    }
}

fn parse_body(body: &Bytes) -> Result<orchestrator::Request, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))
}

async fn create_response(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    require_json_content_type(&headers)?;
    let request = parse_body(&body)?;

    dispatch(&state, request).await
}

async fn compact_response(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    require_json_content_type(&headers)?;
    let request = parse_body(&body)?;

    if request.previous_response_id.is_none() {
        return Err(ApiError::bad_request("compact requires previous_response_id").with_param("previous_response_id"));
    }

    dispatch(&state, request).await
}

async fn dispatch(state: &AppState, request: orchestrator::Request) -> Result<Response, ApiError> {
    let cancellation = state.shutdown_signal.child_token();

    match state.orchestrator.create(request, cancellation).await? {
        CreateOutcome::Sync(response) | CreateOutcome::Background(response) => Ok(Json(response).into_response()),
        CreateOutcome::Stream(receiver) => Ok(sse_response(receiver)),
    }
}

/// Builds the streaming response from the orchestrator's already-framed SSE text channel. Frames
/// are forwarded verbatim — this layer does no further encoding.
fn sse_response(receiver: tokio::sync::mpsc::UnboundedReceiver<String>) -> Response {
    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|chunk| (Ok::<_, std::io::Error>(chunk), receiver))
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", HeaderValue::from_static("no"))
        .body(Body::from_stream(stream))
        .expect("static headers and streaming body are always a valid response")
}

async fn get_response(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let response = state.orchestrator.get(&id).await?;
    Ok(Json(response).into_response())
}

async fn delete_response(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    state.orchestrator.delete(&id).await?;

    Ok(Json(serde_json::json!({
        "id": id,
        "object": "response",
        "deleted": true,
    }))
    .into_response())
}

async fn cancel_response(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let response = state.orchestrator.cancel(&id).await?;
    Ok(Json(response).into_response())
}

async fn list_models(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "object": "list",
        "data": state.resolver.list(),
    }))
    .into_response()
}

async fn get_model(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    state
        .resolver
        .get_summary(&id)
        .map(|summary| Json(summary).into_response())
        .ok_or_else(|| orchestrator::OrchestratorError::NotFound(format!("no model found with id `{id}`")).into())
}
