use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

mod broadcast;
mod cdc;
mod config;
mod handlers;
mod metrics;
mod middleware;
mod server;

use broadcast::{BroadcastHub, Frame};
use cdc::ChangeEvent;
use config::Config;
use metrics::{MetricsAggregator, RequestOutcome};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Counters and sliding windows — the shim and CDC paths write, dashboards read.
    pub metrics: Arc<MetricsAggregator>,

    /// Live dashboard connections.
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(subscriber_buffer: usize) -> Self {
        Self {
            metrics: Arc::new(MetricsAggregator::new()),
            hub: Arc::new(BroadcastHub::new(subscriber_buffer)),
        }
    }

    /// Store a change event and push it to every dashboard.
    /// Shared by the log consumer and the webhook.
    pub fn record_change(&self, event: ChangeEvent) {
        self.metrics.record_change_event(event.clone());
        self.hub.publish(&Frame::cdc_event(event));
    }

    /// Count a completed request; `broadcast` is false for the dashboard's
    /// own traffic.
    pub fn record_request(&self, outcome: RequestOutcome, broadcast: bool) {
        let frame = broadcast.then(|| {
            Frame::api_request(outcome.endpoint.clone(), outcome.status_code, outcome.latency_ms)
        });
        self.metrics.record_request(outcome);
        if let Some(frame) = frame {
            self.hub.publish(&frame);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::parse();

    // ── 1. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState::new(cfg.subscriber_buffer));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── 2. Background producers ──────────────────────────────────
    let mut tasks = Vec::new();

    if cfg.no_ingest {
        info!("log consumer disabled, CDC events arrive via webhook only");
    } else {
        tasks.push(spawn_ingestor(&cfg, state.clone(), shutdown_rx.clone()));
    }

    if let Some(period) = cfg.metrics_interval() {
        tasks.push(tokio::spawn(metrics::stream::run_ticker(
            state.clone(),
            period,
            shutdown_rx.clone(),
        )));
    }

    // ── 3. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state.clone());

    // ── 4. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    info!("metrics JSON  → /api/monitoring/metrics");
    info!("dashboard WS  → /ws/monitoring");

    let hub = state.hub.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
        hub.close_all();
    })
    .await?;

    for task in tasks {
        let _ = task.await;
    }
    info!("stopped");
    Ok(())
}

#[cfg(feature = "kafka")]
fn spawn_ingestor(
    cfg: &Config,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let ingestor = cdc::ingestor::Ingestor::new(cfg.into(), state);
    tokio::spawn(ingestor.run(shutdown))
}

#[cfg(not(feature = "kafka"))]
fn spawn_ingestor(
    _cfg: &Config,
    _state: Arc<AppState>,
    _shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tracing::warn!("built without the `kafka` feature, CDC events arrive via webhook only");
    tokio::spawn(async {})
}

async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
