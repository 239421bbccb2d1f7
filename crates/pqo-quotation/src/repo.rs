//! Direct JSONB persistence for the `quotations` table.
//!
//! Bypasses the generic `DocStore` trait on purpose: the service layer needs
//! to compose a quotation write with an event-store append and an outbox
//! enqueue in one transaction, which is cross-table by nature and not
//! something a single-collection trait can express cleanly.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{Postgres, Row, Transaction};

use pqo_schemas::quotation::{ExtractedOffer, LineItem, Quotation, QuotationState, SupplierRef};
use pqo_schemas::version_vector::VersionVector;

use crate::error::ServiceError;

pub async fn load_for_update(tx: &mut Transaction<'_, Postgres>, id: &str) -> Result<Option<Quotation>, ServiceError> {
    let row = sqlx::query("SELECT doc FROM quotations WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(|r| doc_to_quotation(r.get::<Value, _>("doc"))))
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, quotation: &Quotation) -> Result<(), ServiceError> {
    sqlx::query("INSERT INTO quotations (id, doc, version, updated_at) VALUES ($1, $2, 0, now())")
        .bind(&quotation.id)
        .bind(quotation_to_doc(quotation))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn save(tx: &mut Transaction<'_, Postgres>, quotation: &Quotation) -> Result<(), ServiceError> {
    sqlx::query(
        "UPDATE quotations SET doc = $2, version = version + 1, updated_at = now() WHERE id = $1",
    )
    .bind(&quotation.id)
    .bind(quotation_to_doc(quotation))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub fn quotation_to_doc(q: &Quotation) -> Value {
    json!({
        "id": q.id,
        "correlationId": q.correlation_id,
        "supplier": { "id": q.supplier.id, "name": q.supplier.name, "email": q.supplier.email },
        "items": q.items.iter().map(|i| json!({
            "productId": i.product_id, "requestedQuantity": i.requested_quantity, "unit": i.unit,
        })).collect::<Vec<_>>(),
        "state": q.state,
        "timestamps": {
            "createdAt": q.timestamps.created_at,
            "emailSentAt": q.timestamps.email_sent_at,
            "replyReceivedAt": q.timestamps.reply_received_at,
            "orderedAt": q.timestamps.ordered_at,
            "receivedAt": q.timestamps.received_at,
            "cancelledAt": q.timestamps.cancelled_at,
            "expiredAt": q.timestamps.expired_at,
        },
        "offer": serde_json::to_value(&q.offer).unwrap_or(Value::Null),
        "orderId": q.order_id,
        "invoiceNumber": q.invoice_number,
        "cancellationReason": q.cancellation_reason,
        "retryCount": q.retry_count,
        "version": q.version,
        "versionVector": q.version_vector,
        "deduplicationKey": q.deduplication_key,
        "isAutoGenerated": q.is_auto_generated,
        "softDeleted": q.soft_deleted,
    })
}

fn doc_to_quotation(doc: Value) -> Quotation {
    let get_str = |key: &str| doc.get(key).and_then(Value::as_str).map(String::from);
    let get_dt = |obj: &Value, key: &str| -> Option<DateTime<Utc>> {
        obj.get(key).and_then(Value::as_str).and_then(|s| s.parse().ok())
    };
    let ts = doc.get("timestamps").cloned().unwrap_or(Value::Null);
    let supplier = doc.get("supplier").cloned().unwrap_or(Value::Null);

    Quotation {
        id: get_str("id").unwrap_or_default(),
        correlation_id: get_str("correlationId").unwrap_or_default(),
        supplier: SupplierRef {
            id: supplier.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            name: supplier.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            email: supplier.get("email").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        items: doc
            .get("items")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|i| LineItem {
                        product_id: i.get("productId").and_then(Value::as_str).unwrap_or_default().to_string(),
                        requested_quantity: i.get("requestedQuantity").and_then(Value::as_i64).unwrap_or(0),
                        unit: i.get("unit").and_then(Value::as_str).unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        state: doc
            .get("state")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or(QuotationState::Pending),
        timestamps: pqo_schemas::quotation::QuotationTimestamps {
            created_at: get_dt(&ts, "createdAt"),
            email_sent_at: get_dt(&ts, "emailSentAt"),
            reply_received_at: get_dt(&ts, "replyReceivedAt"),
            ordered_at: get_dt(&ts, "orderedAt"),
            received_at: get_dt(&ts, "receivedAt"),
            cancelled_at: get_dt(&ts, "cancelledAt"),
            expired_at: get_dt(&ts, "expiredAt"),
        },
        offer: doc
            .get("offer")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_else(ExtractedOffer::default),
        order_id: get_str("orderId"),
        invoice_number: get_str("invoiceNumber"),
        cancellation_reason: get_str("cancellationReason"),
        retry_count: doc.get("retryCount").and_then(Value::as_u64).unwrap_or(0) as u32,
        version: doc.get("version").and_then(Value::as_u64).unwrap_or(0),
        version_vector: doc
            .get("versionVector")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_else(VersionVector::new),
        deduplication_key: get_str("deduplicationKey").unwrap_or_default(),
        is_auto_generated: doc.get("isAutoGenerated").and_then(Value::as_bool).unwrap_or(false),
        soft_deleted: doc.get("softDeleted").and_then(Value::as_bool).unwrap_or(false),
    }
}
