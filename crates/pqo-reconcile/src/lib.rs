//! pqo-reconcile — the Hygiene/Reconciler: offline and periodic duplicate
//! detection and repair (spec §2) over the invariants `pqo-quotation` and
//! `pqo-orders` already enforce transactionally. A non-empty sweep result
//! means one of those guards was bypassed, not that it failed.

pub mod guard;
pub mod repair;
pub mod scan;
pub mod sweep;

pub use guard::ReconcileFreshnessGuard;
pub use repair::{repair_duplicate_orders, repair_duplicate_quotations, RepairReport};
pub use scan::{scan_duplicate_orders, scan_duplicate_quotations, DuplicateOrderGroup, DuplicateQuotationGroup};
pub use sweep::Reconciler;
