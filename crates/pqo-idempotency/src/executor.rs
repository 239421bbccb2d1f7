//! `Execute` — the idempotency-enforced call wrapper (spec §4.5).

use std::future::Future;

use chrono::Utc;
use pqo_config::IdempotencyConfig;
use pqo_schemas::fingerprint::{bucket, hash_fingerprint, idempotency_key};
use pqo_schemas::idempotency::{IdempotencyRecord, IdempotencyStatus};
use pqo_schemas::outbox::ProcessingLease;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::cache::LocalCache;
use crate::error::IdempotencyError;

/// What `Execute` does when it finds an in-flight (`Processing`,
/// unexpired-lease) record for the same fingerprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictStrategy {
    ReturnCached,
    ThrowConflict,
    ExecuteAnyway,
}

pub struct IdempotencyExecutor {
    pool: PgPool,
    config: IdempotencyConfig,
    cache: LocalCache,
    processor_id: String,
}

impl IdempotencyExecutor {
    pub fn new(pool: PgPool, config: IdempotencyConfig) -> Self {
        Self {
            pool,
            config,
            cache: LocalCache::new(10_000),
            processor_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn fingerprint_key(&self, operation_type: &str, sorted_params: &[String]) -> String {
        let bucket_secs = self.config.ttl.as_secs().max(1) as i64;
        let b = bucket(Utc::now().timestamp(), bucket_secs);
        let fp = hash_fingerprint(operation_type, sorted_params, b);
        idempotency_key(operation_type, &fp)
    }

    pub async fn execute<T, F, Fut>(
        &self,
        operation_type: &str,
        sorted_params: &[String],
        strategy: ConflictStrategy,
        f: F,
    ) -> Result<T, IdempotencyError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let key = self.fingerprint_key(operation_type, sorted_params);
        let now = Utc::now();

        if let Some(cached) = self.cache.get(&key, now) {
            if cached.status == IdempotencyStatus::Completed {
                return decode(cached.cached_result);
            }
        }

        match self.check_or_claim(&key, strategy, now).await? {
            ClaimOutcome::UseCached(record) => return decode(record.cached_result),
            ClaimOutcome::Proceed => {}
        }

        let result = f().await;
        self.persist_outcome(&key, &result).await?;
        result.map_err(IdempotencyError::OperationFailed)
    }

    async fn check_or_claim(
        &self,
        key: &str,
        strategy: ConflictStrategy,
        now: chrono::DateTime<Utc>,
    ) -> Result<ClaimOutcome, IdempotencyError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT doc FROM idempotency_records WHERE id = $1 FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

        let existing = row.and_then(|r| decode_record(key, r.get("doc")));

        if let Some(record) = &existing {
            if record.status == IdempotencyStatus::Completed && record.expires_at > now {
                let _ = tx.rollback().await;
                self.cache.put(record.clone());
                return Ok(ClaimOutcome::UseCached(record.clone()));
            }

            let lease_active = record
                .lease
                .as_ref()
                .map(|l| {
                    now - l.acquired_at
                        < chrono::Duration::from_std(self.config.lock_ttl).unwrap_or_default()
                })
                .unwrap_or(false);

            if record.status == IdempotencyStatus::Processing && lease_active {
                let _ = tx.rollback().await;
                return match strategy {
                    ConflictStrategy::ReturnCached => Ok(ClaimOutcome::UseCached(record.clone())),
                    ConflictStrategy::ThrowConflict => {
                        Err(IdempotencyError::Conflict(format!("{key} is already processing")))
                    }
                    ConflictStrategy::ExecuteAnyway => Ok(ClaimOutcome::Proceed),
                };
            }
        }

        let claim = IdempotencyRecord {
            key: key.to_string(),
            status: IdempotencyStatus::Processing,
            cached_result: None,
            error: None,
            expires_at: now + self.config.ttl,
            lease: Some(ProcessingLease {
                processor_id: self.processor_id.clone(),
                acquired_at: now,
            }),
        };

        sqlx::query(
            "INSERT INTO idempotency_records (id, doc, version, updated_at)
             VALUES ($1, $2, 0, now())
             ON CONFLICT (id) DO UPDATE SET doc = $2, version = idempotency_records.version + 1, updated_at = now()",
        )
        .bind(key)
        .bind(encode_record(&claim))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(ClaimOutcome::Proceed)
    }

    async fn persist_outcome<T: Serialize>(&self, key: &str, result: &Result<T, String>) -> Result<(), IdempotencyError> {
        let now = Utc::now();
        let record = match result {
            Ok(value) => IdempotencyRecord {
                key: key.to_string(),
                status: IdempotencyStatus::Completed,
                cached_result: Some(serde_json::to_value(value).map_err(|e| IdempotencyError::Internal(e.to_string()))?),
                error: None,
                expires_at: now + self.config.ttl,
                lease: None,
            },
            Err(message) => IdempotencyRecord {
                key: key.to_string(),
                status: IdempotencyStatus::Failed,
                cached_result: None,
                error: Some(message.clone()),
                expires_at: now + self.config.ttl,
                lease: None,
            },
        };

        sqlx::query(
            "UPDATE idempotency_records SET doc = $2, version = version + 1, updated_at = now() WHERE id = $1",
        )
        .bind(key)
        .bind(encode_record(&record))
        .execute(&self.pool)
        .await?;

        self.cache.put(record);
        self.cache.purge_expired_now();
        Ok(())
    }
}

enum ClaimOutcome {
    UseCached(IdempotencyRecord),
    Proceed,
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<T, IdempotencyError> {
    let value = value.ok_or_else(|| IdempotencyError::Internal("cached record missing result".into()))?;
    serde_json::from_value(value).map_err(|e| IdempotencyError::Internal(e.to_string()))
}

fn encode_record(record: &IdempotencyRecord) -> Value {
    serde_json::json!({
        "key": record.key,
        "status": record.status,
        "cachedResult": record.cached_result,
        "error": record.error,
        "expiresAt": record.expires_at,
        "lease": record.lease.as_ref().map(|l| serde_json::json!({
            "processorId": l.processor_id,
            "acquiredAt": l.acquired_at,
        })),
    })
}

fn decode_record(key: &str, doc: Value) -> Option<IdempotencyRecord> {
    Some(IdempotencyRecord {
        key: key.to_string(),
        status: serde_json::from_value(doc.get("status")?.clone()).ok()?,
        cached_result: doc.get("cachedResult").cloned().filter(|v| !v.is_null()),
        error: doc.get("error").and_then(|v| v.as_str()).map(String::from),
        expires_at: doc.get("expiresAt").and_then(|v| v.as_str())?.parse().ok()?,
        lease: doc.get("lease").and_then(|v| {
            if v.is_null() {
                None
            } else {
                Some(ProcessingLease {
                    processor_id: v.get("processorId")?.as_str()?.to_string(),
                    acquired_at: v.get("acquiredAt")?.as_str()?.parse().ok()?,
                })
            }
        }),
    })
}
