//! pqo-quotation — the Quotation Lifecycle State Machine (spec §4.6): a
//! pure, idempotent-apply FSM plus a transactional service that composes it
//! with the event store and outbox.

pub mod error;
pub mod repo;
pub mod service;
pub mod state_machine;

pub use error::{ServiceError, TransitionError};
pub use service::{QuotationService, TransitionOutcome};
pub use state_machine::{HistoryEntry, QuotationEvent, QuotationMachine};
