//! Validation and service errors for order creation (spec §4.7).

use std::fmt;

/// Fail-fast validation failures, each a specific, non-retryable user error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    MissingQuotation,
    MissingQuotationId,
    MissingSupplierId,
    EmptyItems,
    InvalidUnitPrice { product_id: String },
    InvalidQuantity { product_id: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingQuotation => write!(f, "quotation is required"),
            Self::MissingQuotationId => write!(f, "quotation id must be a non-empty stable string"),
            Self::MissingSupplierId => write!(f, "quotation has no supplier id"),
            Self::EmptyItems => write!(f, "quotation has no items to order"),
            Self::InvalidUnitPrice { product_id } => write!(f, "item {product_id} has a non-finite or NaN unit price"),
            Self::InvalidQuantity { product_id } => write!(f, "item {product_id} does not have a positive integer quantity"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        "Validation"
    }

    pub fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    Store(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Store(_) => "PersistError",
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Store(_) => true,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Store(msg) => write!(f, "order store error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ValidationError> for ServiceError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
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
