//! Axum router and HTTP handlers for pqo-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so scenario tests can
//! compose the bare router directly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::state::{AppState, HealthResponse, StatusResponse};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status))
        .route("/v1/reconcile/run", post(reconcile_run))
        .route("/v1/outbox/dead-letters", get(list_dead_letters))
        .route("/v1/outbox/dead-letters/:id/retry", post(retry_dead_letter))
        .with_state(state)
}

pub(crate) async fn health(State(st): State<AppState>) -> impl IntoResponse {
    let _ = &st;
    (StatusCode::OK, Json(HealthResponse { ok: true, service: "pqo-daemon", version: env!("CARGO_PKG_VERSION") }))
}

pub(crate) async fn status(State(st): State<AppState>) -> impl IntoResponse {
    let reconciler_clean = st.reconciler.read().await.is_clean();
    (
        StatusCode::OK,
        Json(StatusResponse {
            uptime_secs: st.uptime_secs(),
            reconciler_clean,
            active_cdc_subscriptions: st.cdc.active_count(),
        }),
    )
}

/// Triggers an out-of-cycle duplicate-detection sweep and returns its
/// report. The background loop keeps running on its own interval
/// regardless; this just runs one pass early.
pub(crate) async fn reconcile_run(State(st): State<AppState>) -> Response {
    match st.reconciler.write().await.run_once().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}

pub(crate) async fn list_dead_letters(State(st): State<AppState>) -> Response {
    match st.outbox.list_dead_letters(100).await {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}

pub(crate) async fn retry_dead_letter(State(st): State<AppState>, Path(id): Path<String>) -> Response {
    match st.outbox.retry_dead_letter(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response(),
    }
}
