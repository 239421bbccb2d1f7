//! `CreateOrderFromQuotation` and its "supreme law" uniqueness enforcement
//! (spec §4.7): deterministic id, then fingerprint, then a bounded-retry
//! lock, then a final re-check inside the write transaction.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use pqo_eventstore::{append_in_tx, NewEvent};
use pqo_lock::{AcquireOptions, LockError, LockManager};
use pqo_outbox::{enqueue, NewOutboxMessage};
use pqo_schemas::event::EventMetadata;
use pqo_schemas::fingerprint::order_fingerprint;
use pqo_schemas::order::{Order, OrderItem, OrderStatus};
use pqo_schemas::quotation::derive_order_id;

use crate::error::ServiceError;
use crate::repo;
use crate::request::CreateOrderRequest;

pub struct OrderService {
    pool: PgPool,
    locks: LockManager,
}

pub struct CreateOrderOutcome {
    pub order: Order,
    /// True when an existing order was returned instead of a new one being
    /// written — the S2 "double-submit" case from the scenario tests.
    pub is_duplicate: bool,
}

impl OrderService {
    pub fn new(pool: PgPool, locks: LockManager) -> Self {
        Self { pool, locks }
    }

    pub async fn create_order_from_quotation(&self, request: CreateOrderRequest) -> Result<CreateOrderOutcome, ServiceError> {
        request.validate()?;

        let order_id = derive_order_id(&request.quotation_id);
        let items = dedup_and_build_items(&request);
        let fingerprint = fingerprint_for(&request.supplier_id, &items);

        // Step 1: pre-insert check by deterministic id.
        if let Some(existing) = self.find_existing(&order_id).await? {
            return Ok(CreateOrderOutcome { order: existing, is_duplicate: true });
        }

        // Step 2: fingerprint check.
        if let Some(existing) = self.find_existing_by_fingerprint(&fingerprint).await? {
            return Ok(CreateOrderOutcome { order: existing, is_duplicate: true });
        }

        // Step 3: bounded-retry lock. Unavailability is not fatal — the
        // write transaction below re-checks and provides the real atomicity.
        let lock = self
            .locks
            .acquire(
                "ORDER_CREATE",
                &request.quotation_id,
                AcquireOptions { max_retries: Some(3), ..Default::default() },
            )
            .await;

        let guard = match lock {
            Ok(guard) => Some(guard),
            Err(LockError::Unavailable(_)) => {
                if let Some(existing) = self.find_existing(&order_id).await? {
                    return Ok(CreateOrderOutcome { order: existing, is_duplicate: true });
                }
                None
            }
            Err(err) => return Err(ServiceError::Store(err.to_string())),
        };

        let outcome = self.write_order_in_tx(&order_id, &request, items, fingerprint).await;

        if let Some(guard) = guard {
            let _ = guard.release().await;
        }

        outcome
    }

    async fn find_existing(&self, order_id: &str) -> Result<Option<Order>, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let existing = repo::find_by_id(&mut tx, order_id).await?;
        tx.rollback().await?;
        Ok(existing)
    }

    async fn find_existing_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Order>, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let existing = repo::find_by_fingerprint(&mut tx, fingerprint).await?;
        tx.rollback().await?;
        Ok(existing)
    }

    async fn write_order_in_tx(
        &self,
        order_id: &str,
        request: &CreateOrderRequest,
        items: Vec<OrderItem>,
        fingerprint: String,
    ) -> Result<CreateOrderOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Step 4: re-check deterministic id once more, now under the
        // transaction that will provide atomicity for the write below.
        if let Some(existing) = repo::find_by_id_for_update(&mut tx, order_id).await? {
            tx.rollback().await?;
            return Ok(CreateOrderOutcome { order: existing, is_duplicate: true });
        }

        let quoted_total = Order::compute_total(&items);
        let order = Order {
            id: order_id.to_string(),
            quotation_id: request.quotation_id.clone(),
            supplier_id: request.supplier_id.clone(),
            items,
            quoted_total,
            delivery_terms: request.delivery_terms.clone(),
            status: OrderStatus::PendingConfirmation,
            confirmed_at: None,
            confirmed_by: None,
            fingerprint,
            is_duplicate: false,
            created_at: Utc::now(),
        };

        repo::insert(&mut tx, &order).await?;

        append_in_tx(
            &mut tx,
            NewEvent {
                event_type: "ORDER_CREATED".into(),
                aggregate_id: order.id.clone(),
                aggregate_type: "order".into(),
                client_timestamp: None,
                payload: json!({
                    "orderId": order.id,
                    "quotationId": order.quotation_id,
                    "supplierId": order.supplier_id,
                    "quotedTotal": order.quoted_total,
                }),
                metadata: EventMetadata { source: "pqo-orders".into(), user: None, environment: "production".into() },
                correlation_id: Some(order.quotation_id.clone()),
                causation_id: None,
            },
        )
        .await?;

        enqueue(
            &mut tx,
            NewOutboxMessage {
                message_type: "push_status_change".into(),
                payload: json!({ "orderId": order.id, "status": order.status }),
                aggregate_id: order.id.clone(),
                aggregate_type: "order".into(),
                correlation_id: order.quotation_id.clone(),
                priority: 0,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(CreateOrderOutcome { order, is_duplicate: false })
    }
}

fn dedup_and_build_items(request: &CreateOrderRequest) -> Vec<OrderItem> {
    let items: Vec<OrderItem> = request
        .items
        .iter()
        .map(|i| OrderItem { product_id: i.product_id.clone(), quantity: i.quantity_to_order, quoted_unit_price: i.quoted_unit_price })
        .collect();
    Order::dedup_items(items)
}

fn fingerprint_for(supplier_id: &str, items: &[OrderItem]) -> String {
    let pairs: Vec<(String, i64)> = items.iter().map(|i| (i.product_id.clone(), i.quantity)).collect();
    order_fingerprint(supplier_id, &pairs, Utc::now().timestamp())
}
