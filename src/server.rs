use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::broadcast::socket;
use crate::handlers;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router`: monitoring API, CDC webhook, dashboard
/// WebSocket, and the instrumentation layer wrapping all of them.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Monitoring API ──────────────────────────────────────
        .route(
            "/api/monitoring/metrics",
            get(handlers::monitoring::get_metrics),
        )
        .route(
            "/api/monitoring/metrics/reset",
            post(handlers::monitoring::reset_metrics),
        )
        .route(
            "/api/monitoring/cdc-event",
            post(handlers::webhook::cdc_event),
        )
        // ── Live dashboard feed ─────────────────────────────────
        .route("/ws/monitoring", get(socket::ws_monitoring))
        // ── Liveness ────────────────────────────────────────────
        .route("/health", get(handlers::monitoring::health))
        .fallback(handlers::not_found)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            timing::instrument,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
