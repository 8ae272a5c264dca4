use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;

use super::window::RingWindow;
use super::RequestOutcome;
use crate::cdc::ChangeEvent;

// ─── Configuration ───────────────────────────────────────────────

/// Sliding window used for the average-latency figure
pub const MAX_REQUEST_OUTCOMES: usize = 1000;

/// Recent change events retained in memory
pub const MAX_CHANGE_EVENTS: usize = 100;

/// Change events included in a snapshot
pub const SNAPSHOT_CHANGE_EVENTS: usize = 20;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe aggregation engine.
/// The instrumentation layer and the CDC paths write, dashboards read
/// through `snapshot()`. Counters and windows share one lock, so a
/// snapshot never sees a half-applied record or reset.
pub struct MetricsAggregator {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub by_endpoint: BTreeMap<String, EndpointStats>,
    pub by_status: BTreeMap<u16, u64>,
    /// Current latency window, oldest first
    pub response_times: Vec<RequestOutcome>,
    /// Mean latency over the window, rounded to whole ms
    pub avg_response_time: u64,
    /// Percentage of 2xx responses over all-time totals
    pub success_rate: u64,
}

/// Point-in-time view shipped to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests: RequestStats,
    /// Newest first
    pub cdc_events: Vec<ChangeEvent>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    // All-time counters, independent of the windows
    total: u64,
    success: u64,
    error: u64,
    by_endpoint: BTreeMap<String, EndpointStats>,
    by_status: BTreeMap<u16, u64>,

    outcomes: RingWindow<RequestOutcome>,
    change_events: RingWindow<ChangeEvent>,
}

// ─── MetricsAggregator impl ──────────────────────────────────────

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_capacity(MAX_REQUEST_OUTCOMES, MAX_CHANGE_EVENTS)
    }

    pub fn with_capacity(outcomes: usize, change_events: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new(outcomes, change_events)),
        }
    }

    /// Count one completed request and push it into the latency window.
    pub fn record_request(&self, outcome: RequestOutcome) {
        self.inner.lock().record_request(outcome);
    }

    /// Insert a change event at the head of the recent-events window.
    pub fn record_change_event(&self, event: ChangeEvent) {
        self.inner.lock().change_events.push(event);
    }

    /// Zero every counter and empty both windows in one step.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let (outcomes, events) = (inner.outcomes.capacity(), inner.change_events.capacity());
        *inner = Inner::new(outcomes, events);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot()
    }

    /// Every retained change event, newest first.
    #[cfg(test)]
    pub fn change_events(&self) -> Vec<ChangeEvent> {
        self.inner.lock().change_events.iter().rev().cloned().collect()
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new(outcomes: usize, change_events: usize) -> Self {
        Self {
            total: 0,
            success: 0,
            error: 0,
            by_endpoint: BTreeMap::new(),
            by_status: BTreeMap::new(),
            outcomes: RingWindow::with_capacity(outcomes),
            change_events: RingWindow::with_capacity(change_events),
        }
    }

    fn record_request(&mut self, outcome: RequestOutcome) {
        let status = outcome.status_code;
        let endpoint = self.by_endpoint.entry(outcome.endpoint.clone()).or_default();
        endpoint.total += 1;
        self.total += 1;

        // 1xx/3xx count toward total only
        if (200..300).contains(&status) {
            self.success += 1;
            endpoint.success += 1;
        } else if status >= 400 {
            self.error += 1;
            endpoint.error += 1;
        }
        *self.by_status.entry(status).or_insert(0) += 1;

        self.outcomes.push(outcome);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let avg_response_time = if self.outcomes.is_empty() {
            0
        } else {
            let sum: u64 = self.outcomes.iter().map(|o| o.latency_ms).sum();
            (sum as f64 / self.outcomes.len() as f64).round() as u64
        };

        let success_rate = if self.total > 0 {
            (self.success as f64 / self.total as f64 * 100.0).round() as u64
        } else {
            0
        };

        MetricsSnapshot {
            requests: RequestStats {
                total: self.total,
                success: self.success,
                error: self.error,
                by_endpoint: self.by_endpoint.clone(),
                by_status: self.by_status.clone(),
                response_times: self.outcomes.iter().cloned().collect(),
                avg_response_time,
                success_rate,
            },
            cdc_events: self
                .change_events
                .iter()
                .rev()
                .take(SNAPSHOT_CHANGE_EVENTS)
                .cloned()
                .collect(),
        }
    }
}
