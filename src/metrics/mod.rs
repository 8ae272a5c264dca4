pub mod collector;
pub mod stream;
pub mod window;

pub use collector::{MetricsAggregator, MetricsSnapshot};

use serde::Serialize;

/// One completed HTTP request, as observed by the instrumentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcome {
    /// Epoch milliseconds at completion.
    pub timestamp: i64,
    /// e.g. "GET /api/user/profile"
    pub endpoint: String,
    pub status_code: u16,
    pub latency_ms: u64,
}
