//! Deterministic fingerprint / deduplication-key derivation.
//!
//! A fingerprint is a time-bucketed hash of an operation's logical identity:
//! `hash(operationType, sortedParams, floor(now / bucketSecs))`. Two calls
//! describing the same logical operation within the same bucket collapse to
//! the same fingerprint, which is what the idempotency layer and the order
//! service's uniqueness gate both rely on.

use sha2::{Digest, Sha256};

/// Width of the daily dedup bucket, in seconds. See spec §9 Open Questions:
/// this is a 24h reorder window, confirmed as the shipped default.
pub const DAILY_BUCKET_SECS: i64 = 86_400;

/// Compute `floor(unix_secs / bucket_secs)`.
pub fn bucket(unix_secs: i64, bucket_secs: i64) -> i64 {
    unix_secs.div_euclid(bucket_secs)
}

/// Hash `operation_type`, a list of already-sorted param strings, and a time
/// bucket into a stable hex digest.
pub fn hash_fingerprint(operation_type: &str, sorted_params: &[String], bucket: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation_type.as_bytes());
    hasher.update(b"\0");
    for p in sorted_params {
        hasher.update(p.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(bucket.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// `hash(supplierId, sorted(productIds), dailyBucket)` — the quotation
/// dedup key from spec §3.
pub fn quotation_dedup_key(supplier_id: &str, product_ids: &[String], now_unix_secs: i64) -> String {
    let mut sorted = product_ids.to_vec();
    sorted.sort();
    let b = bucket(now_unix_secs, DAILY_BUCKET_SECS);
    hash_fingerprint("quotation", &[supplier_id.to_string()], b) + "_" + &hash_fingerprint("items", &sorted, b)
}

/// `hash(supplierId, sorted(productId:quantity), dailyBucket)` — the order
/// fingerprint from spec §3.
pub fn order_fingerprint(
    supplier_id: &str,
    items: &[(String, i64)],
    now_unix_secs: i64,
) -> String {
    let mut pairs: Vec<String> = items
        .iter()
        .map(|(pid, qty)| format!("{pid}:{qty}"))
        .collect();
    pairs.sort();
    let b = bucket(now_unix_secs, DAILY_BUCKET_SECS);
    hash_fingerprint("order", &[supplier_id.to_string()], b) + "_" + &hash_fingerprint("items", &pairs, b)
}

/// The idempotency key: `operationType_fingerprint16` (first 16 hex chars).
pub fn idempotency_key(operation_type: &str, full_fingerprint_hash: &str) -> String {
    let short: String = full_fingerprint_hash.chars().take(16).collect();
    format!("{operation_type}_{short}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_stable_within_window() {
        let b1 = bucket(1_700_000_000, DAILY_BUCKET_SECS);
        let b2 = bucket(1_700_000_000 + 3600, DAILY_BUCKET_SECS);
        assert_eq!(b1, b2);
    }

    #[test]
    fn bucket_advances_after_24h() {
        let b1 = bucket(1_700_000_000, DAILY_BUCKET_SECS);
        let b2 = bucket(1_700_000_000 + DAILY_BUCKET_SECS, DAILY_BUCKET_SECS);
        assert_eq!(b2, b1 + 1);
    }

    #[test]
    fn quotation_dedup_key_ignores_product_order() {
        let now = 1_700_000_000;
        let a = quotation_dedup_key("sup-1", &["p2".into(), "p1".into()], now);
        let b = quotation_dedup_key("sup-1", &["p1".into(), "p2".into()], now);
        assert_eq!(a, b);
    }

    #[test]
    fn order_fingerprint_differs_on_quantity() {
        let now = 1_700_000_000;
        let a = order_fingerprint("sup-1", &[("p1".into(), 10)], now);
        let b = order_fingerprint("sup-1", &[("p1".into(), 20)], now);
        assert_ne!(a, b);
    }

    #[test]
    fn idempotency_key_uses_first_16_hex_chars() {
        let key = idempotency_key("create_order", "abcdef0123456789aaaaaaaa");
        assert_eq!(key, "create_order_abcdef0123456789");
    }
}
