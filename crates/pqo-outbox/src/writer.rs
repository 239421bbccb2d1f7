//! Enqueue-in-transaction (spec §4.4).

use chrono::Utc;
use pqo_schemas::outbox::{OutboxMessage, OutboxStatus};
use serde_json::{json, Value};
use sqlx::{Postgres, Transaction};

use crate::error::OutboxError;

#[derive(Clone, Debug)]
pub struct NewOutboxMessage {
    pub message_type: String,
    pub payload: Value,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub correlation_id: String,
    pub priority: i32,
}

/// Writes the outbox record inside the caller's transaction, so the message
/// is enqueued iff the caller's domain write commits.
pub async fn enqueue(
    tx: &mut Transaction<'_, Postgres>,
    message: NewOutboxMessage,
) -> Result<OutboxMessage, OutboxError> {
    let record = OutboxMessage {
        id: uuid::Uuid::new_v4().to_string(),
        message_type: message.message_type,
        payload: message.payload,
        aggregate_id: message.aggregate_id,
        aggregate_type: message.aggregate_type,
        correlation_id: message.correlation_id,
        priority: message.priority,
        status: OutboxStatus::Pending,
        retry_count: 0,
        last_error: None,
        scheduled_for: Utc::now(),
        lease: None,
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO outbox_messages (id, doc, version, updated_at) VALUES ($1, $2, 0, now())")
        .bind(&record.id)
        .bind(to_doc(&record))
        .execute(&mut **tx)
        .await?;

    Ok(record)
}

pub(crate) fn to_doc(m: &OutboxMessage) -> Value {
    json!({
        "id": m.id,
        "messageType": m.message_type,
        "payload": m.payload,
        "aggregateId": m.aggregate_id,
        "aggregateType": m.aggregate_type,
        "correlationId": m.correlation_id,
        "priority": m.priority,
        "status": m.status,
        "retryCount": m.retry_count,
        "lastError": m.last_error,
        "scheduledFor": m.scheduled_for,
        "lease": m.lease.as_ref().map(|l| json!({"processorId": l.processor_id, "acquiredAt": l.acquired_at})),
        "createdAt": m.created_at,
    })
}

pub(crate) fn from_row(id: String, doc: Value) -> Option<OutboxMessage> {
    Some(OutboxMessage {
        id,
        message_type: doc.get("messageType")?.as_str()?.to_string(),
        payload: doc.get("payload").cloned().unwrap_or(Value::Null),
        aggregate_id: doc.get("aggregateId")?.as_str()?.to_string(),
        aggregate_type: doc.get("aggregateType")?.as_str()?.to_string(),
        correlation_id: doc.get("correlationId")?.as_str()?.to_string(),
        priority: doc.get("priority").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
        status: serde_json::from_value(doc.get("status")?.clone()).ok()?,
        retry_count: doc.get("retryCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        last_error: doc.get("lastError").and_then(|v| v.as_str()).map(String::from),
        scheduled_for: doc.get("scheduledFor").and_then(|v| v.as_str())?.parse().ok()?,
        lease: doc.get("lease").and_then(|v| {
            if v.is_null() {
                None
            } else {
                Some(pqo_schemas::outbox::ProcessingLease {
                    processor_id: v.get("processorId")?.as_str()?.to_string(),
                    acquired_at: v.get("acquiredAt")?.as_str()?.parse().ok()?,
                })
            }
        }),
        created_at: doc.get("createdAt").and_then(|v| v.as_str())?.parse().ok()?,
    })
}
