//! The Order aggregate (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingConfirmation,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub quoted_unit_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub quotation_id: String,
    pub supplier_id: String,
    pub items: Vec<OrderItem>,
    pub quoted_total: f64,
    pub delivery_terms: Option<String>,
    pub status: OrderStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    pub fingerprint: String,
    pub is_duplicate: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Deduplicate items by composite key `(quotationId, productId)`,
    /// keeping the first occurrence and summing quantities of later
    /// duplicates — the order's own id supplies the `quotationId` half of
    /// the composite key, so this is purely a per-`productId` merge here.
    pub fn dedup_items(items: Vec<OrderItem>) -> Vec<OrderItem> {
        let mut by_product: Vec<OrderItem> = Vec::new();
        for item in items {
            if let Some(existing) = by_product
                .iter_mut()
                .find(|i: &&mut OrderItem| i.product_id == item.product_id)
            {
                existing.quantity += item.quantity;
            } else {
                by_product.push(item);
            }
        }
        by_product
    }

    pub fn compute_total(items: &[OrderItem]) -> f64 {
        items
            .iter()
            .map(|i| i.quantity as f64 * i.quoted_unit_price)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pid: &str, qty: i64, price: f64) -> OrderItem {
        OrderItem {
            product_id: pid.to_string(),
            quantity: qty,
            quoted_unit_price: price,
        }
    }

    #[test]
    fn dedup_items_merges_duplicate_product_ids() {
        let items = vec![item("p1", 5, 2.0), item("p2", 1, 3.0), item("p1", 3, 2.0)];
        let deduped = Order::dedup_items(items);
        assert_eq!(deduped.len(), 2);
        let p1 = deduped.iter().find(|i| i.product_id == "p1").unwrap();
        assert_eq!(p1.quantity, 8);
    }

    #[test]
    fn compute_total_sums_quantity_times_price() {
        let items = vec![item("p1", 2, 5.0), item("p2", 3, 1.5)];
        assert_eq!(Order::compute_total(&items), 14.5);
    }
}
