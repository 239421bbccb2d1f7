//! Duplicate-detection sweep: the transactional paths in `pqo-quotation` and
//! `pqo-orders` already make these situations impossible under normal
//! operation, so a non-empty result here means a transaction was bypassed
//! (direct SQL, a restored backup, a migration) rather than that the guards
//! themselves failed.

use sqlx::{PgPool, Row};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateQuotationGroup {
    pub dedup_key: String,
    /// Ids ordered oldest-first; `ids[0]` is the one the repair step keeps.
    pub ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateOrderGroup {
    pub fingerprint: String,
    pub ids: Vec<String>,
}

/// Active (non-terminal) quotations sharing a `deduplicationKey`. Terminal
/// quotations are excluded: a cancelled or expired quotation and a fresh
/// retry that reuses the same key is the expected reorder flow, not a
/// violation.
pub async fn scan_duplicate_quotations(pool: &PgPool) -> Result<Vec<DuplicateQuotationGroup>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT doc->>'deduplicationKey' AS dedup_key, array_agg(id ORDER BY doc->'timestamps'->>'createdAt') AS ids \
         FROM quotations \
         WHERE doc->>'state' IN ('pending', 'awaiting', 'processing', 'ordered') \
         GROUP BY doc->>'deduplicationKey' \
         HAVING COUNT(*) > 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| DuplicateQuotationGroup {
            dedup_key: row.get("dedup_key"),
            ids: row.get::<Vec<String>, _>("ids"),
        })
        .collect())
}

/// Orders sharing a fingerprint. The order-creation path dedups on
/// fingerprint before ever writing, so any group found here predates that
/// guard or bypassed it.
pub async fn scan_duplicate_orders(pool: &PgPool) -> Result<Vec<DuplicateOrderGroup>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT doc->>'fingerprint' AS fingerprint, array_agg(id ORDER BY doc->>'createdAt') AS ids \
         FROM orders \
         GROUP BY doc->>'fingerprint' \
         HAVING COUNT(*) > 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| DuplicateOrderGroup {
            fingerprint: row.get("fingerprint"),
            ids: row.get::<Vec<String>, _>("ids"),
        })
        .collect())
}
