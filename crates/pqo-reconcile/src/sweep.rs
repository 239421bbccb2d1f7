//! Ties scan, repair, and the freshness gate into one periodic sweep.

use chrono::Utc;
use sqlx::PgPool;

use pqo_quotation::QuotationService;

use crate::guard::ReconcileFreshnessGuard;
use crate::repair::{repair_duplicate_orders, repair_duplicate_quotations, RepairReport};
use crate::scan::{scan_duplicate_orders, scan_duplicate_quotations};

pub struct Reconciler {
    pool: PgPool,
    quotations: QuotationService,
    guard: ReconcileFreshnessGuard<fn() -> chrono::DateTime<Utc>>,
}

impl Reconciler {
    pub fn new(pool: PgPool, freshness_bound: chrono::Duration) -> Self {
        let quotations = QuotationService::new(pool.clone());
        Self { pool, quotations, guard: ReconcileFreshnessGuard::new(freshness_bound, Utc::now) }
    }

    /// Runs one sweep: find duplicate quotations and orders, repair them,
    /// and record whether the sweep came back clean.
    pub async fn run_once(&mut self) -> Result<RepairReport, sqlx::Error> {
        let duplicate_quotations = scan_duplicate_quotations(&self.pool).await?;
        let duplicate_orders = scan_duplicate_orders(&self.pool).await?;

        let mut report = RepairReport::default();
        repair_duplicate_quotations(&self.quotations, &duplicate_quotations, &mut report).await;
        repair_duplicate_orders(&self.pool, &duplicate_orders, &mut report).await;

        self.guard.record_sweep_result(report.errors.is_empty());
        if !report.quotations_cancelled.is_empty() || !report.orders_flagged.is_empty() {
            tracing::warn!(
                cancelled = report.quotations_cancelled.len(),
                flagged = report.orders_flagged.len(),
                "reconciler repaired duplicate records"
            );
        }
        Ok(report)
    }

    pub fn is_clean(&self) -> bool {
        self.guard.is_clean()
    }
}
