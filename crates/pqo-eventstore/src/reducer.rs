//! Canonical Quotation reducer (spec §4.2, §4.6).
//!
//! Each event type maps to a deterministic field update: timestamp fields,
//! status, list-replacement for items, scalar fields for totals. Unknown
//! event types are a no-op here — the caller's `load_state`/`replay_events`
//! still advances the returned version, since version tracking lives in the
//! event's own sequence number rather than in reducer output.

use chrono::Utc;
use pqo_schemas::event::Event;
use pqo_schemas::quotation::{ExtractedOffer, Quotation, QuotationState};

pub fn apply_quotation_event(mut state: Quotation, event: &Event) -> Quotation {
    match event.event_type.as_str() {
        "SEND" => {
            state.state = QuotationState::Awaiting;
            state.timestamps.email_sent_at = Some(Utc::now());
        }
        "RECEIVE_REPLY" => {
            state.state = QuotationState::Processing;
            state.timestamps.reply_received_at = Some(Utc::now());
        }
        "EXPIRE" => {
            state.state = QuotationState::Expired;
            state.timestamps.expired_at = Some(Utc::now());
        }
        "AI_EXTRACT" => {
            state.state = QuotationState::Ordered;
            state.order_id = Some(pqo_schemas::quotation::derive_order_id(&state.id));
            if let Some(offer) = decode_offer(&event.payload) {
                state.offer = offer;
            }
            state.timestamps.ordered_at = Some(Utc::now());
        }
        "AI_FAIL" => {
            state.state = QuotationState::Awaiting;
            state.retry_count += 1;
        }
        "MARK_RECEIVED" => {
            state.state = QuotationState::Received;
            state.timestamps.received_at = Some(Utc::now());
            if let Some(invoice) = event.payload.get("invoiceNumber").and_then(|v| v.as_str()) {
                state.invoice_number = Some(invoice.to_string());
            }
        }
        "CANCEL" => {
            state.state = QuotationState::Cancelled;
            state.soft_deleted = true;
            state.timestamps.cancelled_at = Some(Utc::now());
            if let Some(reason) = event.payload.get("cancellationReason").and_then(|v| v.as_str()) {
                state.cancellation_reason = Some(reason.to_string());
            }
        }
        _ => {}
    }
    state
}

fn decode_offer(payload: &serde_json::Value) -> Option<ExtractedOffer> {
    let price = payload.get("price")?.as_f64()?;
    let mut offer = ExtractedOffer::default();
    offer.confidence = payload.get("aiConfidence").and_then(|v| v.as_f64());
    offer.payment_terms = payload
        .get("paymentTerms")
        .and_then(|v| v.as_str())
        .map(String::from);
    offer.delivery_days = payload.get("quotedDeliveryDays").and_then(|v| v.as_i64());
    offer.delivery_date = payload
        .get("quotedDeliveryDate")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    offer.quoted_unit_prices.insert("default".to_string(), price);
    Some(offer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqo_schemas::event::EventMetadata;
    use pqo_schemas::quotation::SupplierRef;
    use serde_json::json;

    fn base_quotation() -> Quotation {
        Quotation::new(
            "quotation_abc",
            "corr-1",
            SupplierRef {
                id: "s1".into(),
                name: "Acme".into(),
                email: "orders@acme.test".into(),
            },
            vec![],
            "dedup-1",
        )
    }

    fn event(event_type: &str, payload: serde_json::Value) -> Event {
        Event {
            event_id: "evt-1".into(),
            event_type: event_type.into(),
            aggregate_id: "quotation_abc".into(),
            aggregate_type: "Quotation".into(),
            version: 1,
            server_timestamp: Utc::now(),
            client_timestamp: None,
            payload,
            metadata: EventMetadata {
                source: "test".into(),
                user: None,
                environment: "test".into(),
            },
            correlation_id: "corr-1".into(),
            causation_id: None,
            immutable: true,
        }
    }

    #[test]
    fn send_transitions_to_awaiting_and_stamps_timestamp() {
        let state = apply_quotation_event(base_quotation(), &event("SEND", json!({})));
        assert_eq!(state.state, QuotationState::Awaiting);
        assert!(state.timestamps.email_sent_at.is_some());
    }

    #[test]
    fn ai_extract_derives_order_id_and_records_offer() {
        let mut state = base_quotation();
        state.state = QuotationState::Processing;
        let state = apply_quotation_event(
            state,
            &event("AI_EXTRACT", json!({"price": 42.5, "aiConfidence": 0.9})),
        );
        assert_eq!(state.state, QuotationState::Ordered);
        assert_eq!(state.order_id.as_deref(), Some("order_abc"));
        assert_eq!(state.offer.confidence, Some(0.9));
    }

    #[test]
    fn ai_fail_increments_retry_count_and_reverts_to_awaiting() {
        let mut state = base_quotation();
        state.state = QuotationState::Processing;
        let state = apply_quotation_event(state, &event("AI_FAIL", json!({})));
        assert_eq!(state.state, QuotationState::Awaiting);
        assert_eq!(state.retry_count, 1);
    }

    #[test]
    fn unknown_event_type_is_a_no_op() {
        let before = base_quotation();
        let after = apply_quotation_event(before.clone(), &event("SOMETHING_ELSE", json!({})));
        assert_eq!(before.state, after.state);
    }
}
