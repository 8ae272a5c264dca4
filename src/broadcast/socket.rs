use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::AppState;

// ─── GET /ws/monitoring ──────────────────────────────────────────

pub async fn ws_monitoring(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state, peer))
}

/// Drive one dashboard connection: forward hub frames until either side
/// goes away, then leave the live set.
async fn handle_connection(socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    let mut sub = state.hub.subscribe();
    let id = sub.id;
    info!(%peer, subscriber = %id, "websocket client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            biased;

            frame = sub.rx.recv() => match frame {
                Some(wire) => {
                    if let Err(e) = ws_tx.send(Message::Text(wire.to_string())).await {
                        warn!(subscriber = %id, error = %e, "websocket send failed");
                        break;
                    }
                }
                // Hub closed us (shutdown)
                None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            },

            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(subscriber = %id, error = %e, "websocket error");
                    break;
                }
                // Dashboards only listen; pings are answered by axum
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unsubscribe(id);
    info!(%peer, subscriber = %id, "websocket client disconnected");
}
