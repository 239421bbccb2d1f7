//! Shared domain types for the procurement orchestration core.
//!
//! Every persisted aggregate round-trips through `serde_json::Value` for
//! storage in a JSONB document column (see `pqo-db`). Types here carry no
//! persistence logic of their own — that lives in the component crates that
//! own each aggregate's lifecycle.

pub mod event;
pub mod fingerprint;
pub mod idempotency;
pub mod inventory;
pub mod lock;
pub mod order;
pub mod outbox;
pub mod quotation;
pub mod snapshot;
pub mod version_vector;

pub use event::Event;
pub use idempotency::{IdempotencyRecord, IdempotencyStatus};
pub use inventory::{Product, ProductSupplier, StockLevel};
pub use lock::LockRecord;
pub use order::{Order, OrderItem, OrderStatus};
pub use outbox::{OutboxMessage, OutboxStatus};
pub use quotation::{OfferItem, Quotation, QuotationState, SupplierRef};
pub use snapshot::Snapshot;
pub use version_vector::VersionVector;
