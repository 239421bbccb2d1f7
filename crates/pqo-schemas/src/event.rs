//! Event Store record type (spec §3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub source: String,
    pub user: Option<String>,
    pub environment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub version: u64,
    pub server_timestamp: DateTime<Utc>,
    pub client_timestamp: Option<DateTime<Utc>>,
    pub payload: Value,
    pub metadata: EventMetadata,
    pub correlation_id: String,
    pub causation_id: Option<String>,
    pub immutable: bool,
}

/// Recursively sanitize a payload: drop `null`/absent values, leave
/// everything else untouched. Date normalization to ISO-8601 UTC is the
/// caller's responsibility at construction time (chrono's `Serialize`
/// impl for `DateTime<Utc>` already emits RFC3339/ISO-8601).
pub fn sanitize_payload(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                out.insert(k, sanitize_payload(v));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(
            arr.into_iter()
                .filter(|v| !v.is_null())
                .map(sanitize_payload)
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_drops_null_fields_recursively() {
        let input = json!({
            "a": 1,
            "b": null,
            "c": { "d": null, "e": 2 },
            "f": [null, 1, { "g": null }]
        });
        let out = sanitize_payload(input);
        assert_eq!(
            out,
            json!({
                "a": 1,
                "c": { "e": 2 },
                "f": [1, {}]
            })
        );
    }
}
