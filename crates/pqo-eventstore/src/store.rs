//! Append-only event log (spec §4.2).

use chrono::{DateTime, Utc};
use pqo_schemas::event::{sanitize_payload, Event, EventMetadata};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::error::EventStoreError;

/// Maximum number of version-conflict retries before `append`/`append_batch`
/// give up and surface `EventStoreError::Conflict` to the caller.
const MAX_APPEND_ATTEMPTS: u32 = 5;

/// Input to `append`/`append_batch`; the store fills in `event_id`,
/// `version`, and `server_timestamp`.
#[derive(Clone, Debug)]
pub struct NewEvent {
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub client_timestamp: Option<DateTime<Utc>>,
    pub payload: Value,
    pub metadata: EventMetadata,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
}

#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append a single event, assigning the next gap-free version for its
    /// `(aggregateType, aggregateId)`. Concurrent appenders race on the
    /// `UNIQUE (aggregate_type, aggregate_id, aggregate_version)`
    /// constraint; the loser retries up to [`MAX_APPEND_ATTEMPTS`] times.
    pub async fn append(&self, new_event: NewEvent) -> Result<Event, EventStoreError> {
        for attempt in 0..MAX_APPEND_ATTEMPTS {
            let mut tx = self.pool.begin().await?;
            let next_version = next_version_for(&mut tx, &new_event.aggregate_type, &new_event.aggregate_id).await?;

            let event = build_event(new_event.clone(), next_version);
            match insert_event(&mut tx, &event).await {
                Ok(()) => {
                    tx.commit().await?;
                    return Ok(event);
                }
                Err(EventStoreError::Conflict(_)) if attempt + 1 < MAX_APPEND_ATTEMPTS => {
                    let _ = tx.rollback().await;
                    continue;
                }
                Err(err) => {
                    let _ = tx.rollback().await;
                    return Err(err);
                }
            }
        }
        Err(EventStoreError::Conflict(format!(
            "could not assign a version for {}/{} after {MAX_APPEND_ATTEMPTS} attempts",
            new_event.aggregate_type, new_event.aggregate_id
        )))
    }

    /// Append every event in one transaction; versions are assigned
    /// sequentially per aggregate within the batch. The causation id of
    /// event *i+1* defaults to event *i*'s id if unset.
    pub async fn append_batch(&self, mut new_events: Vec<NewEvent>) -> Result<Vec<Event>, EventStoreError> {
        if new_events.is_empty() {
            return Ok(Vec::new());
        }

        for attempt in 0..MAX_APPEND_ATTEMPTS {
            let mut tx = self.pool.begin().await?;
            let mut next_versions: std::collections::HashMap<(String, String), u64> = std::collections::HashMap::new();
            let mut built = Vec::with_capacity(new_events.len());
            let mut prev_event_id: Option<String> = None;
            let mut failed = false;

            for raw in new_events.iter().cloned() {
                let key = (raw.aggregate_type.clone(), raw.aggregate_id.clone());
                let version = match next_versions.get(&key) {
                    Some(v) => v + 1,
                    None => next_version_for(&mut tx, &raw.aggregate_type, &raw.aggregate_id).await?,
                };
                let mut raw = raw;
                if raw.causation_id.is_none() {
                    raw.causation_id = prev_event_id.clone();
                }
                let event = build_event(raw, version);
                prev_event_id = Some(event.event_id.clone());
                next_versions.insert(key, version);

                match insert_event(&mut tx, &event).await {
                    Ok(()) => built.push(event),
                    Err(EventStoreError::Conflict(_)) => {
                        failed = true;
                        break;
                    }
                    Err(err) => {
                        let _ = tx.rollback().await;
                        return Err(err);
                    }
                }
            }

            if failed {
                let _ = tx.rollback().await;
                if attempt + 1 < MAX_APPEND_ATTEMPTS {
                    continue;
                }
                return Err(EventStoreError::Conflict(format!(
                    "batch append could not be serialized after {MAX_APPEND_ATTEMPTS} attempts"
                )));
            }

            tx.commit().await?;
            return Ok(built);
        }

        // Unreachable: the loop above always returns within MAX_APPEND_ATTEMPTS.
        new_events.clear();
        Err(EventStoreError::Internal("append_batch exhausted retries unexpectedly".into()))
    }

    /// Events for `(aggregateType, aggregateId)` with `fromVersion <= v <= toVersion`,
    /// ascending by version.
    pub async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        from_version: Option<u64>,
        to_version: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<Event>, EventStoreError> {
        let from = from_version.unwrap_or(0) as i64;
        let to = to_version.map(|v| v as i64).unwrap_or(i64::MAX);
        let limit = limit.unwrap_or(1000).min(10_000) as i64;

        let rows = sqlx::query(
            "SELECT event_id, event_type, aggregate_type, aggregate_id, aggregate_version,
                    server_timestamp, client_timestamp, payload, metadata, correlation_id, causation_id
             FROM events
             WHERE aggregate_type = $1 AND aggregate_id = $2
               AND aggregate_version >= $3 AND aggregate_version <= $4
             ORDER BY aggregate_version ASC
             LIMIT $5",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_event).collect())
    }
}

/// Append a single event using the caller's transaction, so it commits or
/// rolls back atomically with whatever else the caller is doing (e.g. an
/// outbox enqueue). Unlike `EventStore::append`, a version conflict is not
/// retried here — the caller owns the transaction and decides how to retry.
pub async fn append_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    new_event: NewEvent,
) -> Result<Event, EventStoreError> {
    let version = next_version_for(tx, &new_event.aggregate_type, &new_event.aggregate_id).await?;
    let event = build_event(new_event, version);
    insert_event(tx, &event).await?;
    Ok(event)
}

async fn next_version_for(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_type: &str,
    aggregate_id: &str,
) -> Result<u64, EventStoreError> {
    // Lock the aggregate's latest row so concurrent appenders serialize on
    // this read rather than both computing the same value. `FOR UPDATE`
    // cannot be combined with an aggregate function (MAX), so the max is
    // taken in Rust over a single locked row instead.
    let row = sqlx::query(
        "SELECT aggregate_version FROM events
         WHERE aggregate_type = $1 AND aggregate_id = $2
         ORDER BY aggregate_version DESC
         LIMIT 1
         FOR UPDATE",
    )
    .bind(aggregate_type)
    .bind(aggregate_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(r) => Ok(r.get::<i64, _>("aggregate_version") as u64 + 1),
        // First write for this aggregate: no rows to lock, default to version 1.
        None => Ok(1),
    }
}

fn build_event(new_event: NewEvent, version: u64) -> Event {
    Event {
        event_id: uuid::Uuid::new_v4().to_string(),
        event_type: new_event.event_type,
        aggregate_id: new_event.aggregate_id,
        aggregate_type: new_event.aggregate_type,
        version,
        server_timestamp: Utc::now(),
        client_timestamp: new_event.client_timestamp,
        payload: sanitize_payload(new_event.payload),
        metadata: new_event.metadata,
        correlation_id: new_event.correlation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        causation_id: new_event.causation_id,
        immutable: true,
    }
}

async fn insert_event(tx: &mut Transaction<'_, Postgres>, event: &Event) -> Result<(), EventStoreError> {
    sqlx::query(
        "INSERT INTO events
            (event_id, event_type, aggregate_type, aggregate_id, aggregate_version,
             server_timestamp, client_timestamp, payload, metadata, correlation_id, causation_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(&event.event_id)
    .bind(&event.event_type)
    .bind(&event.aggregate_type)
    .bind(&event.aggregate_id)
    .bind(event.version as i64)
    .bind(event.server_timestamp)
    .bind(event.client_timestamp)
    .bind(&event.payload)
    .bind(serde_json::to_value(&event.metadata).unwrap_or(Value::Null))
    .bind(&event.correlation_id)
    .bind(&event.causation_id)
    .execute(&mut **tx)
    .await
    .map(|_| ())
    .map_err(EventStoreError::from)
}

fn row_to_event(row: sqlx::postgres::PgRow) -> Event {
    let metadata: Value = row.get("metadata");
    Event {
        event_id: row.get("event_id"),
        event_type: row.get("event_type"),
        aggregate_id: row.get("aggregate_id"),
        aggregate_type: row.get("aggregate_type"),
        version: row.get::<i64, _>("aggregate_version") as u64,
        server_timestamp: row.get("server_timestamp"),
        client_timestamp: row.get("client_timestamp"),
        payload: row.get("payload"),
        metadata: serde_json::from_value(metadata).unwrap_or(EventMetadata {
            source: "unknown".into(),
            user: None,
            environment: "unknown".into(),
        }),
        correlation_id: row.get("correlation_id"),
        causation_id: row.get("causation_id"),
        immutable: true,
    }
}
