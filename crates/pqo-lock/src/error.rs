//! Lock manager error taxonomy (spec §4.3, §7).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Held by another holder, or the retry budget was exhausted.
    Unavailable(String),
    /// `Release`/`Extend` targeted a holder id that doesn't own the lock.
    Forbidden(String),
    /// Backend I/O failure.
    Internal(String),
}

impl LockError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "LockUnavailable",
            Self::Forbidden(_) => "LockForbidden",
            Self::Internal(_) => "Fatal",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(m) => write!(f, "lock unavailable: {m}"),
            Self::Forbidden(m) => write!(f, "lock held by another holder: {m}"),
            Self::Internal(m) => write!(f, "lock manager internal error: {m}"),
        }
    }
}

impl std::error::Error for LockError {}

impl From<sqlx::Error> for LockError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
