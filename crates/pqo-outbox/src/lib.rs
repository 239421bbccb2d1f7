//! pqo-outbox — the transactional outbox (spec §4.4): same-transaction
//! enqueue, lease-based competing dispatch, retry/backoff, and dead-letter
//! escalation.

pub mod dispatcher;
pub mod error;
pub mod writer;

pub use dispatcher::{BoxedHandler, Dispatcher, HandlerFuture};
pub use error::OutboxError;
pub use writer::{enqueue, NewOutboxMessage};
