pub mod envelope;
#[cfg(feature = "kafka")]
pub mod ingestor;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::AppState;

pub use envelope::decode;

/// One row image: column name → value.
pub type Row = serde_json::Map<String, serde_json::Value>;

// ─── Operation ───────────────────────────────────────────────────

/// Row-level operation carried by a change record.
///
/// Anything outside INSERT/UPDATE/DELETE (DDL, watermarks, …) is kept
/// verbatim as `Other`, already upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Other(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Operation {
    fn from(raw: &str) -> Self {
        let upper = raw.to_uppercase();
        match upper.as_str() {
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => Self::Other(upper),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

// ─── ChangeEvent ─────────────────────────────────────────────────

/// A normalized database change, as stored in the aggregator window and
/// shipped in `cdc_event` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub database: String,
    pub table: String,
    pub operation: Operation,
    /// Row image after the change.
    #[serde(rename = "data")]
    pub row_after: Option<Row>,
    /// Row image before the change.
    #[serde(rename = "old_data")]
    pub row_before: Option<Row>,
}

// ─── Record handling ─────────────────────────────────────────────

/// Decode one log record and forward it to the aggregator and the hub.
///
/// Undecodable records are logged and dropped; nothing is mutated.
/// Returns whether the record was forwarded.
pub fn ingest_record(state: &AppState, payload: Option<&[u8]>) -> bool {
    let now_ms = chrono::Utc::now().timestamp_millis();
    match decode(payload, now_ms) {
        Ok(event) => {
            info!(
                target: "cdc",
                database = %event.database,
                table = %event.table,
                operation = %event.operation,
                "change captured"
            );
            state.record_change(event);
            true
        }
        Err(e) => {
            warn!(error = %e, "discarding CDC record");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_is_upper_cased() {
        assert_eq!(Operation::from("insert"), Operation::Insert);
        assert_eq!(Operation::from("Update"), Operation::Update);
        assert_eq!(Operation::from("DELETE"), Operation::Delete);
        assert_eq!(Operation::from("alter"), Operation::Other("ALTER".into()));
        assert_eq!(Operation::from("alter").to_string(), "ALTER");
    }

    #[test]
    fn change_event_wire_shape() {
        let mut row = Row::new();
        row.insert("id".into(), json!(7));
        let event = ChangeEvent {
            timestamp: 1_700_000_000_000,
            database: "sre_test".into(),
            table: "users".into(),
            operation: Operation::Delete,
            row_after: None,
            row_before: Some(row),
        };

        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(
            v,
            json!({
                "timestamp": 1_700_000_000_000i64,
                "database": "sre_test",
                "table": "users",
                "operation": "DELETE",
                "data": null,
                "old_data": {"id": 7}
            })
        );
    }

    #[tokio::test]
    async fn ingest_forwards_to_aggregator_and_hub() {
        let state = AppState::new(8);
        let mut sub = state.hub.subscribe();
        let raw = br#"{"type":"insert","database":"sre_test","table":"users",
            "data":[{"id":1}],"old":[],"ts":1700000000000}"#;

        assert!(ingest_record(&state, Some(raw.as_slice())));
        assert_eq!(state.metrics.change_events().len(), 1);

        sub.rx.recv().await.unwrap(); // connected
        let v: serde_json::Value = serde_json::from_str(&sub.rx.recv().await.unwrap()).unwrap();
        assert_eq!(v["type"], "cdc_event");
        assert_eq!(v["data"]["operation"], "INSERT");
        assert_eq!(v["data"]["timestamp"], 1_700_000_000_000i64);
    }

    #[tokio::test]
    async fn undecodable_record_touches_nothing() {
        let state = AppState::new(8);
        let mut sub = state.hub.subscribe();
        let raw = br#"{"type":"insert","database":"sre_test","data":[{"id":1}]}"#;

        assert!(!ingest_record(&state, Some(raw.as_slice())));
        assert!(state.metrics.change_events().is_empty());

        sub.rx.recv().await.unwrap(); // connected
        assert!(sub.rx.try_recv().is_err());
    }
}
