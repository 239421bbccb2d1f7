//! Repairs a duplicate group found by [`crate::scan`].

use serde::Serialize;
use sqlx::PgPool;

use pqo_quotation::{QuotationEvent, QuotationService};

use crate::scan::{DuplicateOrderGroup, DuplicateQuotationGroup};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub quotations_cancelled: Vec<String>,
    pub orders_flagged: Vec<String>,
    pub errors: Vec<String>,
}

/// Keeps the oldest quotation in each group, cancels the rest through the
/// normal transition path so the cancellation is itself an audited event
/// with its own outbox side effect, not a silent row edit.
pub async fn repair_duplicate_quotations(service: &QuotationService, groups: &[DuplicateQuotationGroup], report: &mut RepairReport) {
    for group in groups {
        for extra_id in group.ids.iter().skip(1) {
            let result = service
                .apply(
                    extra_id,
                    QuotationEvent::Cancel { reason: format!("reconciler: duplicate of {} for key {}", group.ids[0], group.dedup_key) },
                    None,
                )
                .await;
            match result {
                Ok(_) => report.quotations_cancelled.push(extra_id.clone()),
                Err(err) => report.errors.push(format!("cancel {extra_id}: {err}")),
            }
        }
    }
}

/// Flags every order past the first in each fingerprint group as a
/// duplicate. Orders carry no lifecycle transition to replay this through,
/// so this sets the one boolean field the schema reserves for exactly this
/// (`isDuplicate`) directly.
pub async fn repair_duplicate_orders(pool: &PgPool, groups: &[DuplicateOrderGroup], report: &mut RepairReport) {
    for group in groups {
        for extra_id in group.ids.iter().skip(1) {
            let result = sqlx::query(
                "UPDATE orders SET doc = jsonb_set(doc, '{isDuplicate}', 'true', true), version = version + 1, updated_at = now() WHERE id = $1",
            )
            .bind(extra_id)
            .execute(pool)
            .await;
            match result {
                Ok(_) => report.orders_flagged.push(extra_id.clone()),
                Err(err) => report.errors.push(format!("flag {extra_id}: {err}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_starts_empty() {
        let report = RepairReport::default();
        assert!(report.quotations_cancelled.is_empty());
        assert!(report.orders_flagged.is_empty());
        assert!(report.errors.is_empty());
    }
}
