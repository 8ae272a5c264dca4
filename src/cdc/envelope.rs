//! Decoding of row-level change records (Canal-JSON, as emitted by TiCDC).
//!
//! ```text
//! { "type": "insert", "database": "db", "table": "t",
//!   "data": [ {..} ], "old": [ {..} ], "ts": 1700000000000 }
//! ```

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::{ChangeEvent, Operation, Row};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("record has no payload")]
    EmptyPayload,
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("envelope is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Wire envelope. Every field is optional here so that a missing field
/// surfaces as `DecodeError::MissingField` instead of a serde error.
#[derive(Debug, Deserialize)]
struct CanalEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    database: Option<String>,
    table: Option<String>,
    data: Option<Vec<Value>>,
    old: Option<Vec<Value>>,
    ts: Option<i64>,
}

/// Decode one log record into a `ChangeEvent`.
///
/// `now_ms` stands in for the timestamp when the envelope carries no `ts`.
pub fn decode(payload: Option<&[u8]>, now_ms: i64) -> Result<ChangeEvent, DecodeError> {
    let bytes = match payload {
        Some(b) if !b.is_empty() => b,
        _ => return Err(DecodeError::EmptyPayload),
    };
    let env: CanalEnvelope = serde_json::from_slice(bytes)?;

    let kind = required(env.kind, "type")?;
    let database = required(env.database, "database")?;
    let table = required(env.table, "table")?;

    Ok(ChangeEvent {
        timestamp: env.ts.unwrap_or(now_ms),
        database,
        table,
        operation: Operation::from(kind.as_str()),
        row_after: first_row(env.data),
        row_before: first_row(env.old),
    })
}

fn required(field: Option<String>, name: &'static str) -> Result<String, DecodeError> {
    field
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingField(name))
}

fn first_row(rows: Option<Vec<Value>>) -> Option<Row> {
    match rows?.into_iter().next()? {
        Value::Object(row) => Some(row),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const NOW: i64 = 1_800_000_000_000;

    #[test]
    fn decodes_insert_envelope() {
        let raw = json!({
            "type": "insert",
            "database": "sre_test",
            "table": "users",
            "data": [{"id": 1, "username": "admin"}],
            "old": [],
            "ts": 1_700_000_000_000i64
        })
        .to_string();

        let event = decode(Some(raw.as_bytes()), NOW).unwrap();

        let mut after = Row::new();
        after.insert("id".into(), json!(1));
        after.insert("username".into(), json!("admin"));
        assert_eq!(
            event,
            ChangeEvent {
                timestamp: 1_700_000_000_000,
                database: "sre_test".into(),
                table: "users".into(),
                operation: Operation::Insert,
                row_after: Some(after),
                row_before: None,
            }
        );
    }

    #[test]
    fn update_carries_both_images() {
        let raw = br#"{"type":"update","database":"d","table":"t",
            "data":[{"v":"2"}],"old":[{"v":"1"}],"ts":5}"#;
        let event = decode(Some(raw.as_slice()), NOW).unwrap();
        assert_eq!(event.operation, Operation::Update);
        assert_eq!(event.row_after.unwrap()["v"], json!("2"));
        assert_eq!(event.row_before.unwrap()["v"], json!("1"));
    }

    #[test]
    fn missing_ts_falls_back_to_ingest_time() {
        let raw = br#"{"type":"delete","database":"d","table":"t","old":[{"id":3}]}"#;
        let event = decode(Some(raw.as_slice()), NOW).unwrap();
        assert_eq!(event.timestamp, NOW);
        assert_eq!(event.row_after, None);
        assert!(event.row_before.is_some());
    }

    #[test]
    fn unknown_type_is_forwarded_upper_cased() {
        let raw = br#"{"type":"truncate","database":"d","table":"t","data":null}"#;
        let event = decode(Some(raw.as_slice()), NOW).unwrap();
        assert_eq!(event.operation.as_str(), "TRUNCATE");
    }

    #[test]
    fn missing_table_is_rejected() {
        let raw = br#"{"type":"insert","database":"d","data":[{"id":1}]}"#;
        let err = decode(Some(raw.as_slice()), NOW).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("table")));
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let raw = br#"{"type":"","database":"d","table":"t"}"#;
        assert!(matches!(
            decode(Some(raw.as_slice()), NOW),
            Err(DecodeError::MissingField("type"))
        ));
    }

    #[test]
    fn garbage_and_tombstones_are_rejected() {
        assert!(matches!(
            decode(Some(b"not json".as_slice()), NOW),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(decode(None, NOW), Err(DecodeError::EmptyPayload)));
        assert!(matches!(decode(Some(b"".as_slice()), NOW), Err(DecodeError::EmptyPayload)));
    }
}
