//! Outbox error taxonomy (spec §4.4, §7).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxError {
    /// An unexpired processing lease already exists.
    LeaseHeld(String),
    /// The referenced message doesn't exist.
    NotFound(String),
    /// Backend I/O failure.
    Internal(String),
}

impl OutboxError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::LeaseHeld(_) => "LeaseHeld",
            Self::NotFound(_) => "NotFound",
            Self::Internal(_) => "Fatal",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::LeaseHeld(_))
    }
}

impl fmt::Display for OutboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeaseHeld(m) => write!(f, "outbox message lease already held: {m}"),
            Self::NotFound(m) => write!(f, "outbox message not found: {m}"),
            Self::Internal(m) => write!(f, "outbox internal error: {m}"),
        }
    }
}

impl std::error::Error for OutboxError {}

impl From<sqlx::Error> for OutboxError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
