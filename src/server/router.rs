use axum::extract::{DefaultBodyLimit, Request, State};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use tower_http::trace::TraceLayer;
use tracing::info_span;

use super::request_context::{REQUEST_ID_HEADER, attach_request_context};
use super::state::AppState;
use crate::manager::ManagerStatus;

/// Reference uploads larger than this are rejected before parsing.
const AUDIO_UPLOAD_LIMIT_BYTES: usize = 64 * 1024 * 1024;

/// Router for the service entry point.
pub fn api_router(state: AppState) -> Router {
    let routes = Router::new()
        .route(
            "/generate_music",
            post(super::api::generate_music).layer(DefaultBodyLimit::max(AUDIO_UPLOAD_LIMIT_BYTES)),
        )
        .route("/health", get(health));
    with_common_layers(routes, state)
}

/// Router for the browser UI entry point.
pub fn ui_router(state: AppState) -> Router {
    let routes = Router::new()
        .route(
            "/",
            get(super::ui::index)
                .post(super::ui::submit)
                .layer(DefaultBodyLimit::max(AUDIO_UPLOAD_LIMIT_BYTES)),
        )
        .route("/health", get(health));
    with_common_layers(routes, state)
}

fn with_common_layers(routes: Router<AppState>, state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            correlation_id = %request_id
        )
    });

    routes
        .layer(trace_layer)
        .layer(middleware::from_fn(attach_request_context))
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    manager: ManagerStatus,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        manager: state.manager.status(),
    })
}
