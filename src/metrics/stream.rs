use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::broadcast::Frame;
use crate::AppState;

/// Pushes a `metrics_update` frame every `period` while anyone is
/// listening. Returns once `shutdown` flips to true.
pub async fn run_ticker(
    state: Arc<AppState>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticks = IntervalStream::new(tokio::time::interval(period));
    debug!(?period, "metrics ticker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            tick = ticks.next() => {
                if tick.is_none() {
                    break;
                }
                publish_snapshot(&state);
            }
        }
    }
    debug!("metrics ticker stopped");
}

/// One `metrics_update` broadcast; skipped with no live subscribers.
pub fn publish_snapshot(state: &AppState) {
    if state.hub.subscriber_count() == 0 {
        return;
    }
    state
        .hub
        .publish(&Frame::metrics_update(state.metrics.snapshot()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RequestOutcome;

    #[tokio::test]
    async fn publishes_current_snapshot() {
        let state = Arc::new(AppState::new(8));
        state.record_request(
            RequestOutcome {
                timestamp: 0,
                endpoint: "GET /health".into(),
                status_code: 200,
                latency_ms: 4,
            },
            false,
        );
        let mut sub = state.hub.subscribe();
        publish_snapshot(&state);

        sub.rx.recv().await.unwrap(); // connected
        let v: serde_json::Value = serde_json::from_str(&sub.rx.recv().await.unwrap()).unwrap();
        assert_eq!(v["type"], "metrics_update");
        assert_eq!(v["data"]["requests"]["total"], 1);
    }

    #[tokio::test]
    async fn ticker_stops_on_shutdown() {
        let state = Arc::new(AppState::new(8));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_ticker(state, Duration::from_millis(10), rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
