//! Creates (or resets) the auto-generated quotation for one low-stock
//! product/supplier pair (spec §4.8). The quotation's document id is the
//! dedup key itself, so the store's primary key is the uniqueness gate.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use sqlx::PgPool;

use pqo_eventstore::{append_in_tx, NewEvent};
use pqo_outbox::{enqueue, NewOutboxMessage};
use pqo_quotation::repo;
use pqo_schemas::event::EventMetadata;
use pqo_schemas::inventory::Product;
use pqo_schemas::quotation::{LineItem, Quotation, QuotationState, SupplierRef};

#[derive(Debug, PartialEq, Eq)]
pub enum AutoQuoteOutcome {
    Created,
    SkippedActive,
    SkippedWithinCooldown,
    Recreated,
}

pub async fn create_or_reset_auto_quotation(
    pool: &PgPool,
    dedup_key: &str,
    supplier_id: &str,
    supplier_email: &str,
    product: &Product,
    cooldown_days: i64,
) -> Result<AutoQuoteOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let existing = repo::load_for_update(&mut tx, dedup_key).await.map_err(to_sqlx_opaque)?;

    if let Some(existing) = &existing {
        if existing.state.is_active() {
            tx.rollback().await?;
            return Ok(AutoQuoteOutcome::SkippedActive);
        }
        if existing.state == QuotationState::Received {
            let within_cooldown = existing
                .timestamps
                .received_at
                .is_some_and(|received_at| Utc::now() - received_at < ChronoDuration::days(cooldown_days));
            if within_cooldown {
                tx.rollback().await?;
                return Ok(AutoQuoteOutcome::SkippedWithinCooldown);
            }
        }
    }

    let items = vec![LineItem {
        product_id: product.id.clone(),
        requested_quantity: (product.min_stock - product.stock.current_stock()).max(1),
        unit: "ea".into(),
    }];

    let mut quotation = Quotation::new(
        dedup_key,
        uuid::Uuid::new_v4().to_string(),
        SupplierRef { id: supplier_id.to_string(), name: supplier_id.to_string(), email: supplier_email.to_string() },
        items,
        dedup_key,
    );
    quotation.is_auto_generated = true;

    let outcome = if existing.is_some() {
        repo::save(&mut tx, &quotation).await.map_err(to_sqlx_opaque)?;
        AutoQuoteOutcome::Recreated
    } else {
        repo::insert(&mut tx, &quotation).await.map_err(to_sqlx_opaque)?;
        AutoQuoteOutcome::Created
    };

    append_in_tx(
        &mut tx,
        NewEvent {
            event_type: if outcome == AutoQuoteOutcome::Recreated { "QUOTATION_RECREATED".into() } else { "QUOTATION_CREATED".into() },
            aggregate_id: quotation.id.clone(),
            aggregate_type: "quotation".into(),
            client_timestamp: None,
            payload: json!({ "supplierId": supplier_id, "productIds": quotation.product_ids(), "isAutoGenerated": true }),
            metadata: EventMetadata { source: "pqo-stock-monitor".into(), user: None, environment: "production".into() },
            correlation_id: Some(quotation.correlation_id.clone()),
            causation_id: None,
        },
    )
    .await
    .map_err(to_sqlx_opaque)?;

    enqueue(
        &mut tx,
        NewOutboxMessage {
            message_type: "push_status_change".into(),
            payload: json!({ "quotationId": quotation.id, "state": quotation.state }),
            aggregate_id: quotation.id.clone(),
            aggregate_type: "quotation".into(),
            correlation_id: quotation.correlation_id.clone(),
            priority: 0,
        },
    )
    .await
    .map_err(to_sqlx_opaque)?;

    tx.commit().await?;
    Ok(outcome)
}

/// `pqo-quotation`/`pqo-eventstore`/`pqo-outbox` errors already wrap the
/// underlying `sqlx::Error`'s message; re-threading them as
/// `sqlx::Error::Protocol` keeps this function's signature free of a new
/// error type for what is, at this call depth, always a store failure.
fn to_sqlx_opaque<E: std::fmt::Display>(e: E) -> sqlx::Error {
    sqlx::Error::Protocol(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_enum_is_exhaustively_distinguishable() {
        assert_ne!(AutoQuoteOutcome::Created, AutoQuoteOutcome::Recreated);
        assert_ne!(AutoQuoteOutcome::SkippedActive, AutoQuoteOutcome::SkippedWithinCooldown);
    }
}
