//! Event store error taxonomy (spec §4.2, §7).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    /// Another appender won the race for the next version after exhausting
    /// the retry budget.
    Conflict(String),
    /// Store temporarily unreachable; safe to retry with backoff.
    Unavailable(String),
    /// No events exist for the requested aggregate reference.
    NotFound(String),
    /// Any other backend-reported failure.
    Internal(String),
}

impl EventStoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "Conflict",
            Self::Unavailable(_) => "Transient",
            Self::NotFound(_) => "NotFound",
            Self::Internal(_) => "Fatal",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl fmt::Display for EventStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(m) => write!(f, "event store version conflict: {m}"),
            Self::Unavailable(m) => write!(f, "event store unavailable: {m}"),
            Self::NotFound(m) => write!(f, "event store not found: {m}"),
            Self::Internal(m) => write!(f, "event store internal error: {m}"),
        }
    }
}

impl std::error::Error for EventStoreError {}

impl From<sqlx::Error> for EventStoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Unavailable(err.to_string()),
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => Self::Conflict(err.to_string()),
                Some("40001") | Some("40P01") => Self::Unavailable(err.to_string()),
                _ => Self::Internal(err.to_string()),
            },
            _ => Self::Internal(err.to_string()),
        }
    }
}
