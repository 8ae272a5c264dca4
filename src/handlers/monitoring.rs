use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::metrics::MetricsSnapshot;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

// ─── GET /api/monitoring/metrics ─────────────────────────────────

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

// ─── POST /api/monitoring/metrics/reset ──────────────────────────

pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.metrics.reset();
    info!("metrics reset");
    Json(MessageResponse {
        message: "Metrics reset successfully".into(),
    })
}

// ─── GET /health ─────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now(),
    })
}
