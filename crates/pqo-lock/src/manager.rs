//! Distributed lock manager (spec §4.3).
//!
//! Transactional acquisition, background heartbeat extension, and a
//! `with_lock` convenience wrapper. Test determinism comes from an
//! injectable clock, the same shape as the freshness gate in `pqo-reconcile`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pqo_config::LockConfig;
use pqo_schemas::lock::sanitize_lock_id;
use rand::Rng;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};

use crate::error::LockError;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct AcquireOptions {
    pub ttl: Option<Duration>,
    pub max_retries: Option<u32>,
    pub heartbeat: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            max_retries: None,
            heartbeat: true,
        }
    }
}

#[derive(Clone)]
pub struct LockManager {
    pool: PgPool,
    config: LockConfig,
    now: Clock,
}

impl LockManager {
    pub fn new(pool: PgPool, config: LockConfig) -> Self {
        Self {
            pool,
            config,
            now: Arc::new(Utc::now),
        }
    }

    /// Inject a deterministic clock for tests.
    pub fn with_clock(pool: PgPool, config: LockConfig, clock: Clock) -> Self {
        Self { pool, config, now: clock }
    }

    pub async fn acquire(
        &self,
        scope: &str,
        resource_id: &str,
        options: AcquireOptions,
    ) -> Result<LockGuard, LockError> {
        let lock_id = sanitize_lock_id(scope, resource_id);
        let holder_id = uuid::Uuid::new_v4().to_string();
        let ttl = options.ttl.unwrap_or(self.config.ttl);
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries);

        let mut attempt = 0;
        loop {
            match self.try_acquire_once(&lock_id, &holder_id, ttl).await? {
                true => break,
                false if attempt >= max_retries => {
                    return Err(LockError::Unavailable(format!(
                        "{lock_id} held by another holder after {max_retries} retries"
                    )));
                }
                false => {
                    let delay = backoff_with_jitter(attempt);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }

        let heartbeat_handle = if options.heartbeat {
            Some(spawn_heartbeat(
                self.pool.clone(),
                lock_id.clone(),
                holder_id.clone(),
                ttl,
                self.config.heartbeat_interval,
            ))
        } else {
            None
        };

        Ok(LockGuard {
            pool: self.pool.clone(),
            lock_id,
            holder_id,
            heartbeat_handle,
            released: AtomicBool::new(false),
        })
    }

    /// Run `f` while holding the lock; always releases, including on panic
    /// unwind via `LockGuard`'s `Drop`. If acquisition fails, `f` never runs.
    pub async fn with_lock<F, Fut, T>(
        &self,
        scope: &str,
        resource_id: &str,
        options: AcquireOptions,
        f: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire(scope, resource_id, options).await?;
        let result = f().await;
        guard.release().await?;
        Ok(result)
    }

    pub async fn is_locked(&self, scope: &str, resource_id: &str) -> Result<bool, LockError> {
        let lock_id = sanitize_lock_id(scope, resource_id);
        let row = sqlx::query("SELECT doc FROM distributed_locks WHERE id = $1")
            .bind(&lock_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(false) };
        let doc: Value = row.get("doc");
        let expires_at = parse_expires_at(&doc);
        Ok(expires_at.map(|e| e > (self.now)()).unwrap_or(false))
    }

    async fn try_acquire_once(&self, lock_id: &str, holder_id: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query("SELECT doc FROM distributed_locks WHERE id = $1 FOR UPDATE")
            .bind(lock_id)
            .fetch_optional(&mut *tx)
            .await?;

        let now = (self.now)();
        let still_held = existing
            .as_ref()
            .and_then(|r| {
                let doc: Value = r.get("doc");
                parse_expires_at(&doc)
            })
            .map(|expires_at| expires_at > now)
            .unwrap_or(false);

        if still_held {
            let _ = tx.rollback().await;
            return Ok(false);
        }

        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30));
        let doc = json!({
            "lockId": lock_id,
            "holderId": holder_id,
            "acquiredAt": now,
            "expiresAt": expires_at,
            "heartbeatCount": 0,
            "lastHeartbeatAt": now,
        });

        sqlx::query(
            "INSERT INTO distributed_locks (id, doc, version, updated_at)
             VALUES ($1, $2, 0, now())
             ON CONFLICT (id) DO UPDATE SET doc = $2, version = distributed_locks.version + 1, updated_at = now()",
        )
        .bind(lock_id)
        .bind(&doc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

fn parse_expires_at(doc: &Value) -> Option<DateTime<Utc>> {
    doc.get("expiresAt")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn backoff_with_jitter(attempt: u32) -> Duration {
    let base_ms = 50u64.saturating_mul(1u64 << attempt.min(10));
    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2 + 1);
    Duration::from_millis((base_ms + jitter_ms).min(5_000))
}

fn spawn_heartbeat(
    pool: PgPool,
    lock_id: String,
    holder_id: String,
    ttl: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if extend(&pool, &lock_id, &holder_id, ttl).await.is_err() {
                tracing::warn!(lock_id, holder_id, "heartbeat extend failed, stopping");
                return;
            }
        }
    })
}

async fn extend(pool: &PgPool, lock_id: &str, holder_id: &str, ttl: Duration) -> Result<(), LockError> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query("SELECT doc FROM distributed_locks WHERE id = $1 FOR UPDATE")
        .bind(lock_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Err(LockError::Forbidden(format!("{lock_id} no longer exists")));
    };
    let mut doc: Value = row.get("doc");
    if doc.get("holderId").and_then(|v| v.as_str()) != Some(holder_id) {
        let _ = tx.rollback().await;
        return Err(LockError::Forbidden(format!("{lock_id} no longer held by {holder_id}")));
    }

    let now = Utc::now();
    let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30));
    let heartbeat_count = doc.get("heartbeatCount").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
    doc["expiresAt"] = json!(expires_at);
    doc["heartbeatCount"] = json!(heartbeat_count);
    doc["lastHeartbeatAt"] = json!(now);

    sqlx::query(
        "UPDATE distributed_locks SET doc = $2, version = version + 1, updated_at = now() WHERE id = $1",
    )
    .bind(lock_id)
    .bind(&doc)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// A held lock. `release()` is the explicit, awaitable path; `Drop` is a
/// best-effort fallback (host shutdown, early return, panic unwind) that
/// fires a detached release and aborts the heartbeat task.
pub struct LockGuard {
    pool: PgPool,
    lock_id: String,
    holder_id: String,
    heartbeat_handle: Option<tokio::task::JoinHandle<()>>,
    released: AtomicBool,
}

impl LockGuard {
    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Transactionally verifies holder identity and deletes. Releasing a
    /// non-existent lock succeeds (idempotent); releasing a lock held by a
    /// different holder fails without effect.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.released.store(true, Ordering::SeqCst);
        if let Some(handle) = self.heartbeat_handle.take() {
            handle.abort();
        }
        release_lock(&self.pool, &self.lock_id, &self.holder_id).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.heartbeat_handle.take() {
            handle.abort();
        }
        let pool = self.pool.clone();
        let lock_id = self.lock_id.clone();
        let holder_id = self.holder_id.clone();
        tokio::spawn(async move {
            if let Err(err) = release_lock(&pool, &lock_id, &holder_id).await {
                tracing::warn!(lock_id, holder_id, %err, "best-effort lock release on drop failed");
            }
        });
    }
}

async fn release_lock(pool: &PgPool, lock_id: &str, holder_id: &str) -> Result<(), LockError> {
    let mut tx = pool.begin().await?;
    let existing = sqlx::query("SELECT doc FROM distributed_locks WHERE id = $1 FOR UPDATE")
        .bind(lock_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(row) = existing else {
        let _ = tx.commit().await;
        return Ok(());
    };
    let doc: Value = row.get("doc");
    let current_holder = doc.get("holderId").and_then(|v| v.as_str()).unwrap_or_default();
    if current_holder != holder_id {
        let _ = tx.rollback().await;
        return Err(LockError::Forbidden(format!(
            "{lock_id} is held by {current_holder}, not {holder_id}"
        )));
    }

    sqlx::query("DELETE FROM distributed_locks WHERE id = $1")
        .bind(lock_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
