//! Transition and service errors for the Quotation lifecycle (spec §4.6).

use std::fmt;

use pqo_schemas::quotation::QuotationState;

/// An event was applied to a quotation in a state that does not accept it,
/// or a guard on the transition was not satisfied.
#[derive(Clone, Debug)]
pub struct TransitionError {
    pub from: QuotationState,
    pub event: String,
    pub reason: Option<String>,
}

impl TransitionError {
    pub fn illegal(from: QuotationState, event: impl Into<String>) -> Self {
        Self { from, event: event.into(), reason: None }
    }

    pub fn guard_failed(from: QuotationState, event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { from, event: event.into(), reason: Some(reason.into()) }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "illegal quotation transition: {:?} + {} ({reason})", self.from, self.event),
            None => write!(f, "illegal quotation transition: {:?} + {}", self.from, self.event),
        }
    }
}

impl std::error::Error for TransitionError {}

impl TransitionError {
    pub fn code(&self) -> &'static str {
        "InvalidTransition"
    }

    pub fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub enum ServiceError {
    Transition(TransitionError),
    Store(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transition(e) => e.code(),
            Self::Store(_) => "PersistError",
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            Self::Transition(_) => false,
            Self::Store(_) => true,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition(e) => write!(f, "{e}"),
            Self::Store(msg) => write!(f, "quotation store error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<TransitionError> for ServiceError {
    fn from(e: TransitionError) -> Self {
        Self::Transition(e)
    }
}

impl From<pqo_eventstore::EventStoreError> for ServiceError {
    fn from(e: pqo_eventstore::EventStoreError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<pqo_outbox::OutboxError> for ServiceError {
    fn from(e: pqo_outbox::OutboxError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}
