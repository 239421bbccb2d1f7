//! Idempotency layer error taxonomy (spec §4.5, §7).

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyError {
    /// A concurrent call is still `Processing` and the conflict strategy is
    /// `ThrowConflict`.
    Conflict(String),
    /// `fn` itself failed; the message is the persisted error.
    OperationFailed(String),
    /// Backend I/O failure.
    Internal(String),
}

impl IdempotencyError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "Conflict",
            Self::OperationFailed(_) => "OperationFailed",
            Self::Internal(_) => "Fatal",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl fmt::Display for IdempotencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(m) => write!(f, "idempotency conflict: {m}"),
            Self::OperationFailed(m) => write!(f, "operation failed: {m}"),
            Self::Internal(m) => write!(f, "idempotency internal error: {m}"),
        }
    }
}

impl std::error::Error for IdempotencyError {}

impl From<sqlx::Error> for IdempotencyError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
