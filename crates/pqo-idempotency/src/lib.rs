//! pqo-idempotency — time-bucketed fingerprint deduplication with an
//! in-memory cache over a persistent, lease-guarded record (spec §4.5).

pub mod cache;
pub mod error;
pub mod executor;

pub use cache::LocalCache;
pub use error::IdempotencyError;
pub use executor::{ConflictStrategy, IdempotencyExecutor};
