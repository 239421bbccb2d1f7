//! DocStore error taxonomy (spec §4.1 failure semantics, §7).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocStoreError {
    /// Store temporarily unreachable; safe to retry with backoff.
    Unavailable(String),
    /// Caller-cancelled or deadline-exceeded; safe to retry.
    Cancelled(String),
    /// The document already exists where uniqueness was required.
    AlreadyExists(String),
    /// The requested document does not exist.
    NotFound(String),
    /// A precondition (e.g. expected version) did not hold.
    FailedPrecondition(String),
    /// Any other backend-reported failure.
    Internal(String),
}

impl DocStoreError {
    /// Stable error code per spec §7's taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "Transient",
            Self::Cancelled(_) => "Transient",
            Self::AlreadyExists(_) => "Duplicate",
            Self::NotFound(_) => "NotFound",
            Self::FailedPrecondition(_) => "InvalidTransition",
            Self::Internal(_) => "Fatal",
        }
    }

    /// Transient errors (`Unavailable`, `Cancelled`) are retryable; all
    /// others are terminal to the caller (spec §4.1).
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Cancelled(_))
    }
}

impl fmt::Display for DocStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(m) => write!(f, "docstore unavailable: {m}"),
            Self::Cancelled(m) => write!(f, "docstore operation cancelled: {m}"),
            Self::AlreadyExists(m) => write!(f, "docstore already exists: {m}"),
            Self::NotFound(m) => write!(f, "docstore not found: {m}"),
            Self::FailedPrecondition(m) => write!(f, "docstore failed precondition: {m}"),
            Self::Internal(m) => write!(f, "docstore internal error: {m}"),
        }
    }
}

impl std::error::Error for DocStoreError {}

impl From<sqlx::Error> for DocStoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Unavailable(err.to_string()),
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => Self::AlreadyExists(err.to_string()),
                Some("40001") | Some("40P01") => Self::Unavailable(err.to_string()), // serialization/deadlock
                _ => Self::Internal(err.to_string()),
            },
            _ => Self::Internal(err.to_string()),
        }
    }
}
