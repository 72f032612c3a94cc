//! Web server module for the exporter.
//!
//! Serves the scrape endpoint and a liveness probe.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::collector::Collector;
use crate::config::DEFAULT_METRICS_PATH;
use crate::lifecycle::Lifecycle;
use crate::metrics::ExporterMetrics;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<dyn Collector>,
    pub metrics: ExporterMetrics,
    pub lifecycle: Arc<Lifecycle>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    state: String,
}

/// Create the Axum router serving metrics on [`DEFAULT_METRICS_PATH`].
pub fn create_router(state: AppState) -> Router {
    create_router_with_path(state, DEFAULT_METRICS_PATH)
}

/// Create the Axum router serving metrics on `metrics_path`.
pub fn create_router_with_path(state: AppState, metrics_path: &str) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

/// Liveness probe.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        state: state.lifecycle.state().to_string(),
    })
}

/// Scrape endpoint: collect now, then serialize the registry.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    if !state.lifecycle.is_running() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("exporter is {}", state.lifecycle.state()),
        )
            .into_response();
    }

    if let Err(e) = state.collector.collect().await {
        tracing::error!(collector = %state.collector.name(), error = %e, "Collection failed");

        if e.is_fatal() {
            state.lifecycle.fail(e.to_string());
        }
        let status = if e.is_closed() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        return (status, format!("Error: {}", e)).into_response();
    }

    match state.metrics.encode_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}
