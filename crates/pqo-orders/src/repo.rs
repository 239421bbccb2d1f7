//! Direct JSONB persistence for the `orders` table.
//!
//! Like `pqo-quotation`, this bypasses the generic `DocStore` trait so the
//! service can compose an order write with an event-store append and an
//! outbox enqueue in one transaction.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{Postgres, Row, Transaction};

use pqo_schemas::order::{Order, OrderItem, OrderStatus};

use crate::error::ServiceError;

pub async fn find_by_id(tx: &mut Transaction<'_, Postgres>, id: &str) -> Result<Option<Order>, ServiceError> {
    let row = sqlx::query("SELECT doc FROM orders WHERE id = $1").bind(id).fetch_optional(&mut **tx).await?;
    Ok(row.map(|r| doc_to_order(r.get::<Value, _>("doc"))))
}

pub async fn find_by_id_for_update(tx: &mut Transaction<'_, Postgres>, id: &str) -> Result<Option<Order>, ServiceError> {
    let row = sqlx::query("SELECT doc FROM orders WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(&mut **tx).await?;
    Ok(row.map(|r| doc_to_order(r.get::<Value, _>("doc"))))
}

pub async fn find_by_fingerprint(tx: &mut Transaction<'_, Postgres>, fingerprint: &str) -> Result<Option<Order>, ServiceError> {
    let row = sqlx::query("SELECT doc FROM orders WHERE doc ->> 'fingerprint' = $1")
        .bind(fingerprint)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(|r| doc_to_order(r.get::<Value, _>("doc"))))
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), ServiceError> {
    sqlx::query("INSERT INTO orders (id, doc, version, updated_at) VALUES ($1, $2, 0, now())")
        .bind(&order.id)
        .bind(order_to_doc(order))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn order_to_doc(o: &Order) -> Value {
    json!({
        "id": o.id,
        "quotationId": o.quotation_id,
        "supplierId": o.supplier_id,
        "items": o.items.iter().map(|i| json!({
            "productId": i.product_id, "quantity": i.quantity, "quotedUnitPrice": i.quoted_unit_price,
        })).collect::<Vec<_>>(),
        "quotedTotal": o.quoted_total,
        "deliveryTerms": o.delivery_terms,
        "status": o.status,
        "confirmedAt": o.confirmed_at,
        "confirmedBy": o.confirmed_by,
        "fingerprint": o.fingerprint,
        "isDuplicate": o.is_duplicate,
        "createdAt": o.created_at,
    })
}

fn doc_to_order(doc: Value) -> Order {
    let get_str = |key: &str| doc.get(key).and_then(Value::as_str).map(String::from);
    let get_dt = |key: &str| -> Option<DateTime<Utc>> { doc.get(key).and_then(Value::as_str).and_then(|s| s.parse().ok()) };

    Order {
        id: get_str("id").unwrap_or_default(),
        quotation_id: get_str("quotationId").unwrap_or_default(),
        supplier_id: get_str("supplierId").unwrap_or_default(),
        items: doc
            .get("items")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|i| OrderItem {
                        product_id: i.get("productId").and_then(Value::as_str).unwrap_or_default().to_string(),
                        quantity: i.get("quantity").and_then(Value::as_i64).unwrap_or(0),
                        quoted_unit_price: i.get("quotedUnitPrice").and_then(Value::as_f64).unwrap_or(0.0),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        quoted_total: doc.get("quotedTotal").and_then(Value::as_f64).unwrap_or(0.0),
        delivery_terms: get_str("deliveryTerms"),
        status: doc.get("status").cloned().and_then(|v| serde_json::from_value(v).ok()).unwrap_or(OrderStatus::PendingConfirmation),
        confirmed_at: get_dt("confirmedAt"),
        confirmed_by: get_str("confirmedBy"),
        fingerprint: get_str("fingerprint").unwrap_or_default(),
        is_duplicate: doc.get("isDuplicate").and_then(Value::as_bool).unwrap_or(false),
        created_at: get_dt("createdAt").unwrap_or_else(Utc::now),
    }
}
