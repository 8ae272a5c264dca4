//! Fan-out hub for dashboard connections.
//!
//! Every subscriber owns a bounded queue drained by its WebSocket session.
//! `publish` never waits on a queue: a full queue loses that frame, a
//! closed queue gets its subscriber dropped from the live set.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use super::frame::Frame;

pub type SubscriberId = Uuid;

/// Serialized frame as queued for a session.
pub type WireFrame = Arc<str>;

/// Receiving half handed to a session on subscribe.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<WireFrame>,
}

/// Outcome of a single `publish` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub sent: usize,
    /// Queue full: frame skipped, subscriber kept
    pub missed: usize,
    /// Queue closed: subscriber removed
    pub removed: usize,
}

pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<WireFrame>>>,
    /// Per-subscriber queue depth
    buffer: usize,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber. Its queue already holds the
    /// `connected` frame, so that frame is always delivered first.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);

        if let Some(wire) = encode(&Frame::connected()) {
            let _ = tx.try_send(wire);
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.insert(id, tx);
        debug!(subscriber = %id, active = subscribers.len(), "subscriber registered");

        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.remove(&id).is_some() {
            debug!(subscriber = %id, active = subscribers.len(), "subscriber removed");
        }
    }

    /// Send `frame` to every live subscriber.
    pub fn publish(&self, frame: &Frame) -> PublishReport {
        // Copy the live set so no lock is held while sending
        let targets: Vec<(SubscriberId, mpsc::Sender<WireFrame>)> = {
            let subscribers = self.subscribers.lock();
            if subscribers.is_empty() {
                return PublishReport::default();
            }
            subscribers.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let Some(wire) = encode(frame) else {
            return PublishReport::default();
        };

        let mut report = PublishReport::default();
        let mut dead = Vec::new();

        for (id, tx) in targets {
            if tx.is_closed() {
                dead.push(id);
                continue;
            }
            match tx.try_send(Arc::clone(&wire)) {
                Ok(()) => report.sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => report.missed += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in &dead {
                subscribers.remove(id);
            }
        }
        report.removed = dead.len();

        if report.missed > 0 || report.removed > 0 {
            debug!(
                kind = frame.kind(),
                sent = report.sent,
                missed = report.missed,
                removed = report.removed,
                "broadcast"
            );
        }
        report
    }

    /// Drop every queue; sessions observe end-of-stream and close.
    pub fn close_all(&self) {
        let mut subscribers = self.subscribers.lock();
        let n = subscribers.len();
        subscribers.clear();
        debug!(closed = n, "all subscribers closed");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    #[cfg(test)]
    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }
}

fn encode(frame: &Frame) -> Option<WireFrame> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!(kind = frame.kind(), error = %e, "failed to serialize frame");
            None
        }
    }
}
