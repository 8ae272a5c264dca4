use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::cdc::{ChangeEvent, Operation, Row};
use crate::AppState;

use super::AppError;

// ─── Request / response types ────────────────────────────────────

/// Already-normalized change event, as posted by an out-of-process
/// consumer. Only `database`, `table` and `operation` are required; the
/// remaining fields are taken in whatever shape the producer sends.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub database: Option<String>,
    pub table: Option<String>,
    pub operation: Option<String>,
    /// Row object, or a Canal-style array whose first object is used
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub old_data: Value,
    /// Epoch milliseconds or an RFC 3339 string; ingestion time otherwise
    #[serde(default)]
    pub timestamp: Value,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
}

impl WebhookEvent {
    fn into_change_event(self) -> Option<ChangeEvent> {
        let present = |s: Option<String>| s.filter(|v| !v.is_empty());
        Some(ChangeEvent {
            database: present(self.database)?,
            table: present(self.table)?,
            operation: Operation::from(present(self.operation)?.as_str()),
            timestamp: epoch_ms(&self.timestamp)
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            row_after: row_image(self.data),
            row_before: row_image(self.old_data),
        })
    }
}

fn epoch_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.timestamp_millis()),
        _ => None,
    }
}

fn row_image(value: Value) -> Option<Row> {
    match value {
        Value::Object(row) => Some(row),
        Value::Array(rows) => match rows.into_iter().next()? {
            Value::Object(row) => Some(row),
            _ => None,
        },
        _ => None,
    }
}

// ─── POST /api/monitoring/cdc-event ──────────────────────────────

pub async fn cdc_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WebhookEvent>, JsonRejection>,
) -> Result<Json<WebhookAck>, AppError> {
    let event = payload
        .ok()
        .and_then(|Json(body)| body.into_change_event())
        .ok_or_else(|| {
            warn!("rejected webhook CDC event");
            AppError::BadRequest("Invalid CDC event format".into())
        })?;

    state.record_change(event);
    Ok(Json(WebhookAck { success: true }))
}
