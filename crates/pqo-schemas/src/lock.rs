//! Lock record type (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub lock_id: String,
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub heartbeat_count: u64,
    pub last_heartbeat_at: DateTime<Utc>,
    pub metadata: Value,
}

/// `lockId = scope:resourceId`, with path separators sanitized so the id is
/// safe to use as a document id.
pub fn sanitize_lock_id(scope: &str, resource_id: &str) -> String {
    let clean = |s: &str| s.replace(['/', '\\'], "_");
    format!("{}:{}", clean(scope), clean(resource_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_path_separators() {
        assert_eq!(
            sanitize_lock_id("ORDER_CREATE", "a/b\\c"),
            "ORDER_CREATE:a_b_c"
        );
    }
}
