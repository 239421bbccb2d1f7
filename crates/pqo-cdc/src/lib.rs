//! pqo-cdc — the Change-Data-Capture Subscription Manager (spec §4.10):
//! debounced, batched, auto-reconnecting change delivery over `pqo-db`'s
//! `watch_collection` primitive.

pub mod apply;
pub mod manager;
pub mod subscription;

pub use apply::{apply_changes_to_array, ChangeRecord};
pub use manager::SubscriptionManager;
pub use subscription::{Callback, Filters};
