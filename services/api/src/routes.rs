use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use campus_market::error::AppError;
use campus_market::listings::{CleanupSummary, CleanupSweep};

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/cleanup/sweep",
            axum::routing::post(cleanup_sweep_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "Backend is healthy" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Admin trigger for one cleanup sweep. The external scheduler normally runs
/// the `sweep` subcommand instead; both paths share the same engine and are
/// assumed not to overlap.
pub(crate) async fn cleanup_sweep_endpoint(
    Extension(sweep): Extension<Arc<CleanupSweep>>,
) -> Result<Json<CleanupSummary>, AppError> {
    let summary = sweep.run().await.map_err(AppError::from)?;
    Ok(Json(summary))
}
