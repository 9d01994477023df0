//! Streamable-HTTP flavour of the MCP surface: one JSON-RPC message per
//! `POST /mcp`. Handy for poking the relay with curl.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::server::{json_rpc_error, MAX_MESSAGE_BYTES, PARSE_ERROR, SERVER_NAME};
use crate::state::AppState;

/// Build the router with the given state.
/// Kept separate from `main()` so tests can drive it with `oneshot`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_MESSAGE_BYTES))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
}

/// MCP JSON-RPC 2.0 endpoint handler.
async fn mcp_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(e) => {
            tracing::debug!("MCP http: rejected body: {}", e.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(json_rpc_error(Value::Null, PARSE_ERROR, "Parse error")),
            )
                .into_response();
        }
    };

    match state.server.handle_message(request).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        // Notifications only, nothing to send back.
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let catalog = state.server.catalog();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "app": SERVER_NAME,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "endpoint": state.server.relay().config().endpoint_display(),
        "tools": catalog.tools().len(),
        "prompts": catalog.prompts().len(),
    }))
}
