//! The Quotation lifecycle state machine (spec §4.6).
//!
//! Mirrors the idempotent-apply / illegal-transition-halts shape used
//! elsewhere in this codebase for order-state machines: every event carries
//! an optional id, replays of an already-applied id are silent no-ops, and
//! an event that isn't legal from the current state returns a
//! [`TransitionError`] rather than mutating anything.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use pqo_schemas::quotation::{derive_order_id, ExtractedOffer, OfferItem, Quotation, QuotationState};

use crate::error::TransitionError;

#[derive(Clone, Debug)]
pub enum QuotationEvent {
    Send,
    ReceiveReply { reply_body: String },
    Expire,
    AiExtract { payload: Value, confidence: Option<f64> },
    AiFail,
    MarkReceived { invoice_number: Option<String> },
    Cancel { reason: String },
}

impl QuotationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Send => "SEND",
            Self::ReceiveReply { .. } => "RECEIVE_REPLY",
            Self::Expire => "EXPIRE",
            Self::AiExtract { .. } => "AI_EXTRACT",
            Self::AiFail => "AI_FAIL",
            Self::MarkReceived { .. } => "MARK_RECEIVED",
            Self::Cancel { .. } => "CANCEL",
        }
    }
}

#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub state: QuotationState,
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

/// Wraps a [`Quotation`] with the id-deduplicated `apply` loop and an
/// in-memory trajectory: every applied transition is appended to `history`.
pub struct QuotationMachine {
    pub quotation: Quotation,
    applied: HashSet<String>,
    pub history: Vec<HistoryEntry>,
}

impl QuotationMachine {
    pub fn new(quotation: Quotation) -> Self {
        Self { quotation, applied: HashSet::new(), history: Vec::new() }
    }

    /// Apply `event`, deduplicating against `event_id` when given. Returns
    /// `Ok(false)` for a duplicate id (no-op), `Ok(true)` for an applied
    /// transition, and `Err` for an illegal transition or failed guard.
    pub fn apply(&mut self, event: &QuotationEvent, event_id: Option<&str>) -> Result<bool, TransitionError> {
        if let Some(id) = event_id {
            if self.applied.contains(id) {
                return Ok(false);
            }
        }

        let payload = self.do_transition(event)?;

        if let Some(id) = event_id {
            self.applied.insert(id.to_string());
        }
        self.history.push(HistoryEntry {
            state: self.quotation.state,
            event: event.name().to_string(),
            timestamp: Utc::now(),
            payload,
        });
        Ok(true)
    }

    /// Performs the transition and returns a payload snapshot for the
    /// history entry. Mutates `self.quotation` only on success.
    fn do_transition(&mut self, event: &QuotationEvent) -> Result<Value, TransitionError> {
        use QuotationEvent::*;
        use QuotationState::*;

        let from = self.quotation.state;
        match (from, event) {
            (Pending, Send) | (Awaiting, Send) => {
                if !self.quotation.supplier.email.contains('@') {
                    return Err(TransitionError::guard_failed(from, event.name(), "supplier email is not well-formed"));
                }
                self.quotation.state = Awaiting;
                self.quotation.timestamps.email_sent_at = Some(Utc::now());
                Ok(Value::Null)
            }

            (Awaiting, ReceiveReply { reply_body }) => {
                if self.quotation.timestamps.email_sent_at.is_none() {
                    return Err(TransitionError::guard_failed(from, event.name(), "no email was ever sent"));
                }
                if reply_body.trim().len() < 10 {
                    return Err(TransitionError::guard_failed(from, event.name(), "reply body too short"));
                }
                self.quotation.state = Processing;
                self.quotation.timestamps.reply_received_at = Some(Utc::now());
                Ok(Value::Null)
            }

            (Awaiting, Expire) => {
                self.quotation.state = Expired;
                self.quotation.timestamps.expired_at = Some(Utc::now());
                Ok(Value::Null)
            }

            (Processing, AiExtract { payload, confidence }) => {
                let price = payload.get("price").and_then(Value::as_f64);
                if price.is_none() {
                    return Err(TransitionError::guard_failed(from, event.name(), "payload has no numeric price"));
                }
                self.quotation.state = Ordered;
                self.quotation.order_id = Some(derive_order_id(&self.quotation.id));
                self.quotation.offer = decode_offer(payload, *confidence);
                self.quotation.timestamps.ordered_at = Some(Utc::now());
                Ok(payload.clone())
            }

            (Processing, AiFail) => {
                self.quotation.state = Awaiting;
                self.quotation.retry_count += 1;
                Ok(Value::Null)
            }

            (Ordered, MarkReceived { invoice_number }) => {
                if self.quotation.timestamps.received_at.is_some() {
                    return Err(TransitionError::guard_failed(from, event.name(), "already marked received"));
                }
                self.quotation.state = Received;
                self.quotation.timestamps.received_at = Some(Utc::now());
                self.quotation.invoice_number = invoice_number.clone();
                Ok(Value::Null)
            }

            (Pending, Cancel { reason }) | (Awaiting, Cancel { reason }) | (Processing, Cancel { reason }) | (Ordered, Cancel { reason }) => {
                self.quotation.state = Cancelled;
                self.quotation.cancellation_reason = Some(reason.clone());
                self.quotation.soft_deleted = true;
                self.quotation.timestamps.cancelled_at = Some(Utc::now());
                Ok(Value::Null)
            }

            (state, event) => Err(TransitionError::illegal(state, event.name())),
        }
    }
}

fn decode_offer(payload: &Value, confidence: Option<f64>) -> ExtractedOffer {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|item| OfferItem {
                    name: item.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    unit_price: item.get("unitPrice").and_then(Value::as_f64),
                    available_quantity: item.get("availableQuantity").and_then(Value::as_i64),
                    unit: item.get("unit").and_then(Value::as_str).map(String::from),
                    available: item.get("available").and_then(Value::as_bool),
                    partial_availability: item.get("partialAvailability").and_then(Value::as_bool),
                    unavailable_reason: item.get("unavailableReason").and_then(Value::as_str).map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();

    ExtractedOffer {
        items,
        quoted_unit_prices: Default::default(),
        delivery_date: payload
            .get("quotedDeliveryDate")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        delivery_days: payload.get("quotedDeliveryDays").and_then(Value::as_i64),
        payment_terms: payload.get("paymentTerms").and_then(Value::as_str).map(String::from),
        supplier_notes: payload.get("supplierNotes").and_then(Value::as_str).map(String::from),
        confidence: confidence.or_else(|| payload.get("aiConfidence").and_then(Value::as_f64)),
        extraction_method: payload.get("extractionMethod").and_then(Value::as_str).map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqo_schemas::quotation::{LineItem, SupplierRef};
    use serde_json::json;

    fn quotation() -> Quotation {
        Quotation::new(
            "quotation_abc",
            "corr-1",
            SupplierRef { id: "sup-1".into(), name: "Acme".into(), email: "sales@acme.test".into() },
            vec![LineItem { product_id: "p1".into(), requested_quantity: 10, unit: "ea".into() }],
            "dedupe-1",
        )
    }

    #[test]
    fn send_requires_well_formed_email_and_sets_timestamp() {
        let mut machine = QuotationMachine::new(quotation());
        machine.quotation.supplier.email = "not-an-email".into();
        let err = machine.apply(&QuotationEvent::Send, Some("e1")).unwrap_err();
        assert_eq!(err.from, QuotationState::Pending);

        let mut machine = QuotationMachine::new(quotation());
        machine.apply(&QuotationEvent::Send, Some("e1")).unwrap();
        assert_eq!(machine.quotation.state, QuotationState::Awaiting);
        assert!(machine.quotation.timestamps.email_sent_at.is_some());
    }

    #[test]
    fn resend_from_awaiting_is_idempotent_by_event_id() {
        let mut machine = QuotationMachine::new(quotation());
        assert!(machine.apply(&QuotationEvent::Send, Some("e1")).unwrap());
        assert!(!machine.apply(&QuotationEvent::Send, Some("e1")).unwrap());
        assert_eq!(machine.history.len(), 1);
    }

    #[test]
    fn receive_reply_rejects_short_body() {
        let mut machine = QuotationMachine::new(quotation());
        machine.apply(&QuotationEvent::Send, Some("e1")).unwrap();
        let err = machine
            .apply(&QuotationEvent::ReceiveReply { reply_body: "ok".into() }, Some("e2"))
            .unwrap_err();
        assert_eq!(err.from, QuotationState::Awaiting);
    }

    #[test]
    fn ai_extract_requires_numeric_price_and_derives_order_id() {
        let mut machine = QuotationMachine::new(quotation());
        machine.apply(&QuotationEvent::Send, Some("e1")).unwrap();
        machine
            .apply(&QuotationEvent::ReceiveReply { reply_body: "here is our quote for you".into() }, Some("e2"))
            .unwrap();

        let err = machine
            .apply(&QuotationEvent::AiExtract { payload: json!({}), confidence: None }, Some("e3"))
            .unwrap_err();
        assert_eq!(err.from, QuotationState::Processing);

        machine
            .apply(&QuotationEvent::AiExtract { payload: json!({"price": 12.5}), confidence: Some(0.8) }, Some("e4"))
            .unwrap();
        assert_eq!(machine.quotation.state, QuotationState::Ordered);
        assert_eq!(machine.quotation.order_id.as_deref(), Some("order_abc"));
        assert_eq!(machine.quotation.offer.confidence, Some(0.8));
    }

    #[test]
    fn ai_fail_reverts_to_awaiting_and_increments_retry_count() {
        let mut machine = QuotationMachine::new(quotation());
        machine.apply(&QuotationEvent::Send, Some("e1")).unwrap();
        machine
            .apply(&QuotationEvent::ReceiveReply { reply_body: "here is our quote for you".into() }, Some("e2"))
            .unwrap();
        machine.apply(&QuotationEvent::AiFail, Some("e3")).unwrap();
        assert_eq!(machine.quotation.state, QuotationState::Awaiting);
        assert_eq!(machine.quotation.retry_count, 1);
    }

    #[test]
    fn mark_received_is_rejected_once_already_received() {
        let mut machine = QuotationMachine::new(quotation());
        machine.quotation.state = QuotationState::Ordered;
        machine.apply(&QuotationEvent::MarkReceived { invoice_number: Some("INV-1".into()) }, Some("e1")).unwrap();
        assert_eq!(machine.quotation.state, QuotationState::Received);

        machine.quotation.state = QuotationState::Ordered;
        let err = machine
            .apply(&QuotationEvent::MarkReceived { invoice_number: Some("INV-2".into()) }, Some("e2"))
            .unwrap_err();
        assert_eq!(err.from, QuotationState::Ordered);
    }

    #[test]
    fn cancel_is_legal_from_every_non_terminal_state_and_soft_deletes() {
        for state in [QuotationState::Pending, QuotationState::Awaiting, QuotationState::Processing, QuotationState::Ordered] {
            let mut machine = QuotationMachine::new(quotation());
            machine.quotation.state = state;
            machine.apply(&QuotationEvent::Cancel { reason: "buyer withdrew".into() }, Some("e1")).unwrap();
            assert_eq!(machine.quotation.state, QuotationState::Cancelled);
            assert!(machine.quotation.soft_deleted);
            assert_eq!(machine.quotation.cancellation_reason.as_deref(), Some("buyer withdrew"));
        }
    }

    #[test]
    fn cancel_is_illegal_once_already_terminal() {
        let mut machine = QuotationMachine::new(quotation());
        machine.quotation.state = QuotationState::Cancelled;
        let err = machine.apply(&QuotationEvent::Cancel { reason: "again".into() }, Some("e1")).unwrap_err();
        assert_eq!(err.from, QuotationState::Cancelled);
    }
}
