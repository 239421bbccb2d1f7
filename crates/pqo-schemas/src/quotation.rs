//! The Quotation aggregate (spec §3).
//!
//! Status vocabulary: the source material described two overlapping
//! vocabularies (`pending/awaiting/processing/ordered/received` and
//! `draft/sent/replied/quoted/confirmed/delivered`). This crate models only
//! the first; the mapping to the second (`draft↔pending`, `sent↔awaiting`,
//! `replied↔processing`, `quoted↔ordered`, `confirmed/delivered↔received`)
//! is documentation only, not a type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version_vector::VersionVector;

/// Lifecycle states of a quotation. See `pqo-quotation` for the transition
/// graph and guards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationState {
    Pending,
    Awaiting,
    Processing,
    Ordered,
    Received,
    Cancelled,
    Expired,
}

impl QuotationState {
    /// Terminal states are absorbing: `Received`, `Cancelled`, `Expired`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Received | Self::Cancelled | Self::Expired)
    }

    /// "Active quotation" per the glossary: not in the terminal set.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRef {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub requested_quantity: i64,
    pub unit: String,
}

/// Extracted per-item offer data. Absence is explicit (spec §9): each field
/// a reply may or may not mention is `Option`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferItem {
    pub name: String,
    pub unit_price: Option<f64>,
    pub available_quantity: Option<i64>,
    pub unit: Option<String>,
    pub available: Option<bool>,
    pub partial_availability: Option<bool>,
    pub unavailable_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedOffer {
    pub items: Vec<OfferItem>,
    pub quoted_unit_prices: std::collections::BTreeMap<String, f64>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_days: Option<i64>,
    pub payment_terms: Option<String>,
    pub supplier_notes: Option<String>,
    pub confidence: Option<f64>,
    pub extraction_method: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotationTimestamps {
    pub created_at: Option<DateTime<Utc>>,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub reply_received_at: Option<DateTime<Utc>>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: String,
    pub correlation_id: String,
    pub supplier: SupplierRef,
    pub items: Vec<LineItem>,
    pub state: QuotationState,
    pub timestamps: QuotationTimestamps,
    pub offer: ExtractedOffer,
    pub order_id: Option<String>,
    pub invoice_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub retry_count: u32,
    pub version: u64,
    pub version_vector: VersionVector,
    pub deduplication_key: String,
    pub is_auto_generated: bool,
    pub soft_deleted: bool,
}

impl Quotation {
    pub fn new(
        id: impl Into<String>,
        correlation_id: impl Into<String>,
        supplier: SupplierRef,
        items: Vec<LineItem>,
        deduplication_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            correlation_id: correlation_id.into(),
            supplier,
            items,
            state: QuotationState::Pending,
            timestamps: QuotationTimestamps {
                created_at: Some(Utc::now()),
                ..Default::default()
            },
            offer: ExtractedOffer::default(),
            order_id: None,
            invoice_number: None,
            cancellation_reason: None,
            retry_count: 0,
            version: 0,
            version_vector: VersionVector::new(),
            deduplication_key: deduplication_key.into(),
            is_auto_generated: false,
            soft_deleted: false,
        }
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.product_id.clone()).collect()
    }
}

/// Deterministic order id derivation: `"order_" + stripPrefix(quotationId)`.
/// `stripPrefix` removes a leading `"q_"` or `"quotation_"` token if present;
/// no other transformation is applied beyond this documented rule.
pub fn derive_order_id(quotation_id: &str) -> String {
    let stripped = quotation_id
        .strip_prefix("quotation_")
        .or_else(|| quotation_id.strip_prefix("q_"))
        .unwrap_or(quotation_id);
    format!("order_{stripped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_absorbing() {
        assert!(QuotationState::Received.is_terminal());
        assert!(QuotationState::Cancelled.is_terminal());
        assert!(QuotationState::Expired.is_terminal());
        assert!(!QuotationState::Pending.is_terminal());
        assert!(!QuotationState::Awaiting.is_terminal());
        assert!(!QuotationState::Processing.is_terminal());
        assert!(!QuotationState::Ordered.is_terminal());
    }

    #[test]
    fn derive_order_id_strips_known_prefixes() {
        assert_eq!(derive_order_id("quotation_abc123"), "order_abc123");
        assert_eq!(derive_order_id("q_xyz"), "order_xyz");
        assert_eq!(derive_order_id("P1:S1"), "order_P1:S1");
    }
}
