//! Outbox message type (spec §3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLetter,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLease {
    pub processor_id: String,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: String,
    pub message_type: String,
    pub payload: Value,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub correlation_id: String,
    pub priority: i32,
    pub status: OutboxStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub lease: Option<ProcessingLease>,
    pub created_at: DateTime<Utc>,
}

/// Exponential retry delay schedule: `[1s, 5s, 30s, 2m, 10m]` (spec §4.4 / §6).
pub const RETRY_DELAYS_MS: [i64; 5] = [1_000, 5_000, 30_000, 120_000, 600_000];

/// Delay before the attempt numbered `retry_count` (0-indexed), clamped to
/// the last configured delay for any count beyond the table.
pub fn retry_delay_ms(retry_count: u32) -> i64 {
    let idx = (retry_count as usize).min(RETRY_DELAYS_MS.len() - 1);
    RETRY_DELAYS_MS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_follows_schedule() {
        assert_eq!(retry_delay_ms(0), 1_000);
        assert_eq!(retry_delay_ms(1), 5_000);
        assert_eq!(retry_delay_ms(4), 600_000);
    }

    #[test]
    fn retry_delay_clamps_beyond_schedule() {
        assert_eq!(retry_delay_ms(10), 600_000);
    }
}
