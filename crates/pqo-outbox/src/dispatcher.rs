//! Background dispatcher: lease-based competing consumption, retry/backoff,
//! and dead-letter escalation (spec §4.4). Follows a handler-registry plus
//! batch-processing shape: handlers register by message type, and each poll
//! claims a lease-guarded batch before dispatching it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use pqo_config::OutboxConfig;
use pqo_schemas::outbox::{retry_delay_ms, OutboxMessage, OutboxStatus};
use serde_json::Value;
use sqlx::{PgPool, Row};
use tokio::sync::watch;

use crate::error::OutboxError;
use crate::writer::{from_row, to_doc};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
pub type BoxedHandler = Arc<dyn Fn(Value, Value) -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
pub struct Dispatcher {
    pool: PgPool,
    config: OutboxConfig,
    processor_id: String,
    handlers: Arc<std::sync::RwLock<HashMap<String, BoxedHandler>>>,
}

impl Dispatcher {
    pub fn new(pool: PgPool, config: OutboxConfig) -> Self {
        Self {
            pool,
            config,
            processor_id: uuid::Uuid::new_v4().to_string(),
            handlers: Arc::new(std::sync::RwLock::new(HashMap::new())),
        }
    }

    pub fn register_handler(&self, message_type: &str, handler: BoxedHandler) {
        self.handlers
            .write()
            .expect("handler registry lock poisoned")
            .insert(message_type.to_string(), handler);
    }

    /// Runs the poll loop until `shutdown` reports `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.process_batch().await {
                        tracing::warn!(%err, "outbox dispatch batch failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Poll once and process up to `batch_size` eligible messages. Returns
    /// the number processed (useful for deterministic tests).
    pub async fn process_batch(&self) -> Result<usize, OutboxError> {
        let messages = self.poll_eligible().await?;
        let mut processed = 0;
        for message in messages {
            self.process_one(message).await;
            processed += 1;
        }
        Ok(processed)
    }

    async fn poll_eligible(&self) -> Result<Vec<OutboxMessage>, OutboxError> {
        let rows = sqlx::query(
            "SELECT id, doc FROM outbox_messages
             WHERE doc ->> 'status' IN ('pending', 'failed')
               AND (doc ->> 'scheduledFor')::timestamptz <= now()
             ORDER BY (doc ->> 'createdAt')::timestamptz ASC
             LIMIT $1",
        )
        .bind(self.config.batch_size as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| from_row(r.get("id"), r.get("doc")))
            .collect())
    }

    async fn process_one(&self, message: OutboxMessage) {
        let id = message.id.clone();
        match self.acquire_lease(&id).await {
            Ok(Some(mut leased)) => {
                let handler = self.handlers.read().expect("handler registry lock poisoned").get(&leased.message_type).cloned();
                let result = match handler {
                    Some(h) => h(leased.payload.clone(), Value::Null).await,
                    None => Err(format!("no handler registered for message type {}", leased.message_type)),
                };
                match result {
                    Ok(()) => {
                        if let Err(err) = self.mark_completed(&id).await {
                            tracing::warn!(%id, %err, "failed to mark outbox message completed");
                        }
                    }
                    Err(err) => {
                        leased.last_error = Some(err);
                        if let Err(dispatch_err) = self.mark_failed_or_dead_letter(leased).await {
                            tracing::warn!(%id, %dispatch_err, "failed to record outbox failure");
                        }
                    }
                }
            }
            Ok(None) => {} // lease already held by another dispatcher
            Err(err) => tracing::warn!(%id, %err, "failed to acquire outbox lease"),
        }
    }

    async fn acquire_lease(&self, id: &str) -> Result<Option<OutboxMessage>, OutboxError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT doc FROM outbox_messages WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            let _ = tx.rollback().await;
            return Ok(None);
        };
        let doc: Value = row.get("doc");
        let Some(mut message) = from_row(id.to_string(), doc) else {
            let _ = tx.rollback().await;
            return Ok(None);
        };

        let lease_expired = message
            .lease
            .as_ref()
            .map(|l| {
                Utc::now() - l.acquired_at
                    > chrono::Duration::from_std(self.config.lock_ttl).unwrap_or_default()
            })
            .unwrap_or(true);
        if matches!(message.status, OutboxStatus::Processing) && !lease_expired {
            let _ = tx.rollback().await;
            return Ok(None);
        }

        message.status = OutboxStatus::Processing;
        message.lease = Some(pqo_schemas::outbox::ProcessingLease {
            processor_id: self.processor_id.clone(),
            acquired_at: Utc::now(),
        });

        sqlx::query("UPDATE outbox_messages SET doc = $2, version = version + 1, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(to_doc(&message))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(message))
    }

    async fn mark_completed(&self, id: &str) -> Result<(), OutboxError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT doc FROM outbox_messages WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            let _ = tx.rollback().await;
            return Ok(());
        };
        let Some(mut message) = from_row(id.to_string(), row.get("doc")) else {
            let _ = tx.rollback().await;
            return Ok(());
        };
        message.status = OutboxStatus::Completed;
        message.lease = None;
        sqlx::query("UPDATE outbox_messages SET doc = $2, version = version + 1, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(to_doc(&message))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn mark_failed_or_dead_letter(&self, mut message: OutboxMessage) -> Result<(), OutboxError> {
        message.retry_count += 1;
        message.lease = None;

        let mut tx = self.pool.begin().await?;
        if message.retry_count >= self.config.max_retries {
            message.status = OutboxStatus::DeadLetter;
            sqlx::query("INSERT INTO outbox_dead_letters (id, doc, version, updated_at) VALUES ($1, $2, 0, now())")
                .bind(&message.id)
                .bind(to_doc(&message))
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM outbox_messages WHERE id = $1")
                .bind(&message.id)
                .execute(&mut *tx)
                .await?;
        } else {
            message.status = OutboxStatus::Failed;
            message.scheduled_for = Utc::now() + chrono::Duration::milliseconds(retry_delay_ms(message.retry_count - 1));
            sqlx::query("UPDATE outbox_messages SET doc = $2, version = version + 1, updated_at = now() WHERE id = $1")
                .bind(&message.id)
                .bind(to_doc(&message))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// `retry(id)`: moves a dead-lettered message back to the outbox with
    /// `retryCount = 0`, atomically.
    pub async fn retry_dead_letter(&self, id: &str) -> Result<(), OutboxError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT doc FROM outbox_dead_letters WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            let _ = tx.rollback().await;
            return Err(OutboxError::NotFound(id.to_string()));
        };
        let Some(mut message) = from_row(id.to_string(), row.get("doc")) else {
            let _ = tx.rollback().await;
            return Err(OutboxError::Internal(format!("corrupt dead-letter doc for {id}")));
        };
        message.status = OutboxStatus::Pending;
        message.retry_count = 0;
        message.last_error = None;
        message.scheduled_for = Utc::now();

        sqlx::query("INSERT INTO outbox_messages (id, doc, version, updated_at) VALUES ($1, $2, 0, now())")
            .bind(&message.id)
            .bind(to_doc(&message))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM outbox_dead_letters WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// `list recent entries` admin op for the DLQ.
    pub async fn list_dead_letters(&self, limit: i64) -> Result<Vec<OutboxMessage>, OutboxError> {
        let rows = sqlx::query(
            "SELECT id, doc FROM outbox_dead_letters ORDER BY (doc ->> 'createdAt')::timestamptz DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().filter_map(|r| from_row(r.get("id"), r.get("doc"))).collect())
    }
}
