use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cdc::ChangeEvent;
use crate::metrics::MetricsSnapshot;

/// Envelope for everything pushed to dashboard connections:
/// `{ "type": ..., "data": ..., "timestamp": <ISO-8601> }`.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    #[serde(flatten)]
    pub body: FrameBody,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FrameBody {
    Connected { message: String },
    CdcEvent(ChangeEvent),
    MetricsUpdate(MetricsSnapshot),
    ApiRequest(ApiRequest),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub endpoint: String,
    pub status_code: u16,
    /// Milliseconds
    pub response_time: u64,
}

impl Frame {
    pub fn new(body: FrameBody) -> Self {
        Self {
            body,
            timestamp: Utc::now(),
        }
    }

    pub fn connected() -> Self {
        Self::new(FrameBody::Connected {
            message: "WebSocket connection established".into(),
        })
    }

    pub fn cdc_event(event: ChangeEvent) -> Self {
        Self::new(FrameBody::CdcEvent(event))
    }

    pub fn metrics_update(snapshot: MetricsSnapshot) -> Self {
        Self::new(FrameBody::MetricsUpdate(snapshot))
    }

    pub fn api_request(endpoint: String, status_code: u16, response_time: u64) -> Self {
        Self::new(FrameBody::ApiRequest(ApiRequest {
            endpoint,
            status_code,
            response_time,
        }))
    }

    pub fn kind(&self) -> &'static str {
        match self.body {
            FrameBody::Connected { .. } => "connected",
            FrameBody::CdcEvent(_) => "cdc_event",
            FrameBody::MetricsUpdate(_) => "metrics_update",
            FrameBody::ApiRequest(_) => "api_request",
        }
    }
}
