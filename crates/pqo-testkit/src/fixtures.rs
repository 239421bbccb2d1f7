//! Builders for the two aggregates most scenario tests need seeded rows
//! for. Kept deliberately minimal: callers mutate the returned value before
//! inserting when a test needs a non-default field.

use pqo_schemas::order::{Order, OrderItem, OrderStatus};
use pqo_schemas::quotation::{LineItem, Quotation, QuotationState, SupplierRef};
use serde_json::{json, Value};
use sqlx::PgPool;

pub fn new_quotation(id: &str, dedup_key: &str) -> Quotation {
    Quotation::new(
        id,
        uuid::Uuid::new_v4().to_string(),
        SupplierRef { id: "sup-1".into(), name: "Test Supplier".into(), email: "sup@example.test".into() },
        vec![LineItem { product_id: "p1".into(), requested_quantity: 5, unit: "ea".into() }],
        dedup_key,
    )
}

pub fn quotation_doc(q: &Quotation) -> Value {
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

/// Inserts a quotation row directly (bypassing the state machine), for
/// tests that need to seed a starting state rather than drive a transition.
pub async fn insert_quotation(pool: &PgPool, id: &str, dedup_key: &str, state: QuotationState) {
    let mut q = new_quotation(id, dedup_key);
    q.state = state;
    sqlx::query("INSERT INTO quotations (id, doc, version, updated_at) VALUES ($1, $2, 0, now())")
        .bind(id)
        .bind(quotation_doc(&q))
        .execute(pool)
        .await
        .expect("insert quotation fixture");
}

pub fn new_order(id: &str, fingerprint: &str) -> Order {
    Order {
        id: id.to_string(),
        quotation_id: format!("q-{id}"),
        supplier_id: "sup-1".into(),
        items: vec![OrderItem { product_id: "p1".into(), quantity: 5, quoted_unit_price: 2.0 }],
        quoted_total: 10.0,
        delivery_terms: None,
        status: OrderStatus::PendingConfirmation,
        confirmed_at: None,
        confirmed_by: None,
        fingerprint: fingerprint.to_string(),
        is_duplicate: false,
        created_at: chrono::Utc::now(),
    }
}

pub fn order_doc(o: &Order) -> Value {
    json!({
        "id": o.id, "quotationId": o.quotation_id, "supplierId": o.supplier_id,
        "items": o.items.iter().map(|i| json!({
            "productId": i.product_id, "quantity": i.quantity, "quotedUnitPrice": i.quoted_unit_price,
        })).collect::<Vec<_>>(),
        "quotedTotal": o.quoted_total, "deliveryTerms": o.delivery_terms, "status": o.status,
        "confirmedAt": o.confirmed_at, "confirmedBy": o.confirmed_by, "fingerprint": o.fingerprint,
        "isDuplicate": o.is_duplicate, "createdAt": o.created_at,
    })
}

/// Inserts an order row directly, for tests that only need a seeded row to
/// scan or conflict against.
pub async fn insert_order(pool: &PgPool, id: &str, fingerprint: &str) {
    let order = new_order(id, fingerprint);
    sqlx::query("INSERT INTO orders (id, doc, version, updated_at) VALUES ($1, $2, 0, now())")
        .bind(id)
        .bind(order_doc(&order))
        .execute(pool)
        .await
        .expect("insert order fixture");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotation_doc_round_trips_dedup_key() {
        let q = new_quotation("q-1", "dedupe-1");
        let doc = quotation_doc(&q);
        assert_eq!(doc["deduplicationKey"], "dedupe-1");
        assert_eq!(doc["state"], "pending");
    }

    #[test]
    fn order_doc_carries_fingerprint_and_defaults_not_duplicate() {
        let o = new_order("order-1", "fp-1");
        let doc = order_doc(&o);
        assert_eq!(doc["fingerprint"], "fp-1");
        assert_eq!(doc["isDuplicate"], false);
    }
}
