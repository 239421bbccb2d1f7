//! Orchestrates a quotation transition with its side effects (spec §4.6):
//! the new quotation document, the domain event, and the outbox message(s)
//! it raises all commit or roll back together in one transaction.

use serde_json::{json, Value};
use sqlx::PgPool;

use pqo_eventstore::{append_in_tx, NewEvent};
use pqo_outbox::{enqueue, NewOutboxMessage};
use pqo_schemas::event::EventMetadata;
use pqo_schemas::quotation::Quotation;

use crate::error::ServiceError;
use crate::repo;
use crate::state_machine::{QuotationEvent, QuotationMachine};

pub struct QuotationService {
    pool: PgPool,
}

/// Result of a successful transition: the quotation's new state and the
/// outbox messages it raised, for callers that want to log or assert on them.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub quotation: Quotation,
    pub outbox_message_types: Vec<String>,
}

impl QuotationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, quotation: Quotation) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        repo::insert(&mut tx, &quotation).await?;
        append_in_tx(
            &mut tx,
            NewEvent {
                event_type: "QUOTATION_CREATED".into(),
                aggregate_id: quotation.id.clone(),
                aggregate_type: "quotation".into(),
                client_timestamp: None,
                payload: repo::quotation_to_doc(&quotation),
                metadata: EventMetadata { source: "pqo-quotation".into(), user: None, environment: "production".into() },
                correlation_id: Some(quotation.correlation_id.clone()),
                causation_id: None,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Loads the quotation, applies `event` under `FOR UPDATE`, and commits
    /// the updated document, the event, and any raised outbox messages as a
    /// single transaction.
    pub async fn apply(
        &self,
        quotation_id: &str,
        event: QuotationEvent,
        event_id: Option<&str>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let existing = repo::load_for_update(&mut tx, quotation_id)
            .await?
            .ok_or_else(|| ServiceError::Store(format!("quotation {quotation_id} not found")))?;

        let mut machine = QuotationMachine::new(existing);
        let event_name = event.name().to_string();
        let applied = machine.apply(&event, event_id)?;

        if !applied {
            tx.rollback().await?;
            return Ok(TransitionOutcome { quotation: machine.quotation, outbox_message_types: Vec::new() });
        }

        repo::save(&mut tx, &machine.quotation).await?;

        append_in_tx(
            &mut tx,
            NewEvent {
                event_type: event_name.clone(),
                aggregate_id: machine.quotation.id.clone(),
                aggregate_type: "quotation".into(),
                client_timestamp: None,
                payload: event_payload(&event),
                metadata: EventMetadata { source: "pqo-quotation".into(), user: None, environment: "production".into() },
                correlation_id: Some(machine.quotation.correlation_id.clone()),
                causation_id: event_id.map(String::from),
            },
        )
        .await?;

        let message_types = outbox_messages_for(&event);
        for message_type in &message_types {
            enqueue(
                &mut tx,
                NewOutboxMessage {
                    message_type: message_type.clone(),
                    payload: outbox_payload(&machine.quotation, &event_name),
                    aggregate_id: machine.quotation.id.clone(),
                    aggregate_type: "quotation".into(),
                    correlation_id: machine.quotation.correlation_id.clone(),
                    priority: 0,
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(TransitionOutcome { quotation: machine.quotation, outbox_message_types: message_types })
    }
}

fn event_payload(event: &QuotationEvent) -> Value {
    match event {
        QuotationEvent::AiExtract { payload, .. } => payload.clone(),
        QuotationEvent::ReceiveReply { reply_body } => json!({ "replyBody": reply_body }),
        QuotationEvent::MarkReceived { invoice_number } => json!({ "invoiceNumber": invoice_number }),
        QuotationEvent::Cancel { reason } => json!({ "cancellationReason": reason }),
        QuotationEvent::Send | QuotationEvent::Expire | QuotationEvent::AiFail => Value::Null,
    }
}

fn outbox_payload(quotation: &Quotation, event_name: &str) -> Value {
    json!({
        "quotationId": quotation.id,
        "supplierEmail": quotation.supplier.email,
        "event": event_name,
        "state": quotation.state,
    })
}

/// Which outbox messages a transition raises, per spec §4.6's side effects:
/// sending the RFQ email, nudging on no-reply/AI failure, and pushing a
/// status change for every observed transition.
fn outbox_messages_for(event: &QuotationEvent) -> Vec<String> {
    match event {
        QuotationEvent::Send => vec!["email_quotation_request".into(), "push_status_change".into()],
        QuotationEvent::Expire | QuotationEvent::AiFail => vec!["email_reminder".into(), "push_status_change".into()],
        _ => vec!["push_status_change".into()],
    }
}
