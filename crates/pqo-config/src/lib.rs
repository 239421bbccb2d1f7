//! Environment configuration (spec §6).
//!
//! Every knob has a documented default. A missing or unparsable env var
//! falls back to that default and logs a `tracing::warn!`, it never fails
//! boot — these are tuning knobs, not required secrets (compare
//! `pqo-db::ENV_DB_URL`, which IS required and fails closed).

use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, default, "invalid env var, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_i64_list(key: &str, default: &[i64]) -> Vec<i64> {
    match std::env::var(key) {
        Ok(v) => {
            let parsed: Result<Vec<i64>, _> = v.split(',').map(|s| s.trim().parse()).collect();
            parsed.unwrap_or_else(|_| {
                tracing::warn!(key, value = %v, "invalid env var list, using default");
                default.to_vec()
            })
        }
        Err(_) => default.to_vec(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockConfig {
    pub ttl: Duration,
    pub heartbeat_interval: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl LockConfig {
    pub fn from_env() -> Self {
        Self {
            ttl: Duration::from_millis(env_u64("LOCK_TTL_MS", 30_000)),
            heartbeat_interval: Duration::from_millis(env_u64("LOCK_HEARTBEAT_MS", 10_000)),
            max_retries: env_u64("LOCK_MAX_RETRIES", 5) as u32,
            retry_base: Duration::from_millis(env_u64("LOCK_RETRY_BASE_MS", 100)),
            retry_max: Duration::from_millis(env_u64("LOCK_RETRY_MAX_MS", 5_000)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboxConfig {
    pub batch_size: u32,
    pub poll_interval: Duration,
    pub lock_ttl: Duration,
    pub retry_delays_ms: Vec<i64>,
    pub max_retries: u32,
}

impl OutboxConfig {
    pub fn from_env() -> Self {
        Self {
            batch_size: env_u64("OUTBOX_BATCH_SIZE", 10) as u32,
            poll_interval: Duration::from_millis(env_u64("OUTBOX_POLL_MS", 5_000)),
            lock_ttl: Duration::from_millis(env_u64("OUTBOX_LOCK_TTL_MS", 60_000)),
            retry_delays_ms: env_i64_list(
                "OUTBOX_RETRY_DELAYS_MS",
                &[1_000, 5_000, 30_000, 120_000, 600_000],
            ),
            max_retries: env_u64("OUTBOX_MAX_RETRIES", 5) as u32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdempotencyConfig {
    pub ttl: Duration,
    pub lock_ttl: Duration,
}

impl IdempotencyConfig {
    pub fn from_env() -> Self {
        Self {
            ttl: Duration::from_millis(env_u64("IDEMPOTENCY_TTL_MS", 7_200_000)),
            lock_ttl: Duration::from_millis(env_u64("IDEMPOTENCY_LOCK_TTL_MS", 300_000)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CdcConfig {
    pub debounce: Duration,
    pub max_batch: u32,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl CdcConfig {
    pub fn from_env() -> Self {
        Self {
            debounce: Duration::from_millis(env_u64("CDC_DEBOUNCE_MS", 100)),
            max_batch: env_u64("CDC_MAX_BATCH", 50) as u32,
            reconnect_delay: Duration::from_millis(env_u64("CDC_RECONNECT_DELAY_MS", 1_000)),
            max_reconnect_attempts: env_u64("CDC_MAX_RECONNECT", 5) as u32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockMonitorConfig {
    pub debounce: Duration,
    pub max_batch: u32,
    pub cooldown_days: i64,
}

impl StockMonitorConfig {
    pub fn from_env() -> Self {
        Self {
            debounce: Duration::from_millis(env_u64("STOCK_MONITOR_DEBOUNCE_MS", 3_000)),
            max_batch: env_u64("STOCK_MONITOR_MAX_BATCH", 20) as u32,
            cooldown_days: env_u64("STOCK_MONITOR_COOLDOWN_DAYS", 7) as i64,
        }
    }
}

/// All of the above, loaded once at boot and threaded through the
/// component constructors in the order given by spec §9.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    pub lock: LockConfig,
    pub outbox: OutboxConfig,
    pub idempotency: IdempotencyConfig,
    pub cdc: CdcConfig,
    pub stock_monitor: StockMonitorConfig,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self {
            lock: LockConfig::from_env(),
            outbox: OutboxConfig::from_env(),
            idempotency: IdempotencyConfig::from_env(),
            cdc: CdcConfig::from_env(),
            stock_monitor: StockMonitorConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_defaults_match_spec() {
        // Ensure no stray env var from the test runner leaks in.
        std::env::remove_var("LOCK_TTL_MS");
        let cfg = LockConfig::from_env();
        assert_eq!(cfg.ttl, Duration::from_millis(30_000));
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(10_000));
        assert_eq!(cfg.max_retries, 5);
    }

    #[test]
    fn outbox_retry_delays_default() {
        std::env::remove_var("OUTBOX_RETRY_DELAYS_MS");
        let cfg = OutboxConfig::from_env();
        assert_eq!(cfg.retry_delays_ms, vec![1_000, 5_000, 30_000, 120_000, 600_000]);
    }

    #[test]
    fn env_u64_falls_back_on_garbage() {
        std::env::set_var("PQO_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_u64("PQO_TEST_GARBAGE", 42), 42);
        std::env::remove_var("PQO_TEST_GARBAGE");
    }
}
