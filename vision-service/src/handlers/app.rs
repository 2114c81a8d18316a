use crate::services::get_metrics;
use crate::startup::AppState;
use askama::Template;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub model: String,
}

pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    IndexTemplate {
        model: state.relay.provider().model().to_string(),
    }
}

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "vision-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: the scratch directory exists and the provider answers.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if !state.relay.scratch().root().is_dir() {
        tracing::warn!("Scratch directory is missing");
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    match state.relay.provider().health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Completion provider is not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
