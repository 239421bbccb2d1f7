//! Replay and snapshot acceleration (spec §4.2).

use pqo_schemas::event::Event;
use pqo_schemas::snapshot::Snapshot;
use serde_json::Value;
use sqlx::Row;

use crate::error::EventStoreError;
use crate::store::EventStore;

impl EventStore {
    /// Fold `reducer` over every event for `(aggregateType, aggregateId)`,
    /// starting from `initial`.
    pub async fn replay_events<S, F>(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        initial: S,
        reducer: F,
    ) -> Result<(S, u64), EventStoreError>
    where
        F: Fn(S, &Event) -> S,
    {
        let events = self.get_events(aggregate_type, aggregate_id, None, None, None).await?;
        let version = events.last().map(|e| e.version).unwrap_or(0);
        let state = events.iter().fold(initial, &reducer);
        Ok((state, version))
    }

    /// Load the latest snapshot (if any) and replay only the events that
    /// postdate it, returning the merged state and its resulting version.
    pub async fn load_state<S, F>(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        initial: S,
        reducer: F,
        decode_snapshot: impl Fn(Value) -> S,
    ) -> Result<(S, u64), EventStoreError>
    where
        F: Fn(S, &Event) -> S,
    {
        let snapshot = self.latest_snapshot(aggregate_type, aggregate_id).await?;

        let (state, from_version) = match snapshot {
            Some(snap) => (decode_snapshot(snap.state), snap.version),
            None => (initial, 0),
        };

        let events = self
            .get_events(aggregate_type, aggregate_id, Some(from_version + 1), None, None)
            .await?;
        let final_version = events.last().map(|e| e.version).unwrap_or(from_version);
        let state = events.iter().fold(state, &reducer);
        Ok((state, final_version))
    }

    pub async fn create_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
        version: u64,
        state: Value,
    ) -> Result<(), EventStoreError> {
        let id = format!("{aggregate_type}:{aggregate_id}:{version}");
        sqlx::query(
            "INSERT INTO snapshots (id, doc, version, updated_at)
             VALUES ($1, $2, 0, now())
             ON CONFLICT (id) DO UPDATE SET doc = $2, updated_at = now()",
        )
        .bind(&id)
        .bind(serde_json::json!({
            "aggregateType": aggregate_type,
            "aggregateId": aggregate_id,
            "version": version,
            "state": state,
        }))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn latest_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let row = sqlx::query(
            "SELECT doc FROM snapshots
             WHERE doc ->> 'aggregateType' = $1 AND doc ->> 'aggregateId' = $2
             ORDER BY (doc ->> 'version')::bigint DESC
             LIMIT 1",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| {
            let doc: Value = r.get("doc");
            Snapshot {
                aggregate_type: doc["aggregateType"].as_str().unwrap_or_default().to_string(),
                aggregate_id: doc["aggregateId"].as_str().unwrap_or_default().to_string(),
                version: doc["version"].as_u64().unwrap_or(0),
                state: doc["state"].clone(),
            }
        }))
    }
}
