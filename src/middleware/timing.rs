use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::metrics::RequestOutcome;
use crate::AppState;

/// Paths owned by the dashboard itself. Their requests are counted but
/// never broadcast, or every dashboard poll would spawn another frame.
const MONITORING_PREFIXES: &[&str] = &["/api/monitoring", "/ws/"];

pub fn is_monitoring_path(path: &str) -> bool {
    MONITORING_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Records every completed request into the aggregator and, outside the
/// monitoring namespace, announces it as an `api_request` frame.
///
/// Also adds `Server-Timing: total;dur=<ms>` to the response.
pub async fn instrument(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    let status = response.status().as_u16();
    let latency_ms = elapsed.as_millis() as u64;
    debug!(%method, %path, status, latency_ms, "request completed");

    state.record_request(
        RequestOutcome {
            timestamp: chrono::Utc::now().timestamp_millis(),
            endpoint: format!("{method} {path}"),
            status_code: status,
            latency_ms,
        },
        !is_monitoring_path(&path),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitoring_namespace() {
        assert!(is_monitoring_path("/api/monitoring/metrics"));
        assert!(is_monitoring_path("/api/monitoring"));
        assert!(is_monitoring_path("/ws/monitoring"));
        assert!(!is_monitoring_path("/api/user/profile"));
        assert!(!is_monitoring_path("/health"));
        assert!(!is_monitoring_path("/wsx"));
    }
}
