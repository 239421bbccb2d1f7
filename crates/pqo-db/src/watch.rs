//! Change-stream emulation over Postgres (spec §4.1's `Watch`, consumed by
//! the CDC subscription manager in `pqo-cdc`).
//!
//! Postgres has no native equivalent to a Firestore-style server change
//! feed. Two mechanisms are combined:
//!
//! - `LISTEN`/`NOTIFY` (via a trigger on each watched table, `pg_notify`)
//!   wakes the poller promptly on writes.
//! - A periodic id/version poll is the ground truth: it is what actually
//!   detects `Removed` (a `NOTIFY` can be missed across a reconnect, but a
//!   row's absence from the next poll cannot lie), and it bounds staleness
//!   even if a notification is dropped.
//!
//! Callers get a `tokio_stream::Stream` of [`ChangeEvent`]; the stream task
//! owns its own `PgListener` and reconnects with backoff on listener error
//! (spec §4.10's auto-reconnect requirement lives one layer up in
//! `pqo-cdc`, but the primitive here must itself survive a dropped
//! connection to stay useful to it).

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::{PgPool, Row};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::store::ChangeKind;

#[derive(Clone, Debug)]
pub struct ChangeMetadata {
    pub collection: String,
    pub id: String,
    pub version: i64,
}

#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub meta: ChangeMetadata,
    pub doc: Option<Value>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(750);
const LISTEN_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Start watching `collection` for changes. The returned stream yields one
/// [`ChangeEvent`] per added/modified/removed row; it runs until dropped.
pub fn watch_collection(pool: PgPool, collection: String) -> ReceiverStream<ChangeEvent> {
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(run_watch_loop(pool, collection, tx));
    ReceiverStream::new(rx)
}

async fn run_watch_loop(pool: PgPool, collection: String, tx: mpsc::Sender<ChangeEvent>) {
    let channel = format!("pqo_changes_{collection}");
    let mut known: HashMap<String, i64> = load_known_versions(&pool, &collection)
        .await
        .unwrap_or_default();

    // Emit the initial snapshot as a batch of Added events so a fresh
    // subscriber starts from a consistent view.
    for (id, version) in &known {
        if tx
            .send(ChangeEvent {
                kind: ChangeKind::Added,
                meta: ChangeMetadata {
                    collection: collection.clone(),
                    id: id.clone(),
                    version: *version,
                },
                doc: fetch_doc(&pool, &collection, id).await,
            })
            .await
            .is_err()
        {
            return;
        }
    }

    loop {
        let mut listener = match PgListener::connect_with(&pool).await {
            Ok(l) => l,
            Err(err) => {
                tracing::warn!(%collection, %err, "watch listener connect failed, retrying");
                tokio::time::sleep(LISTEN_RECONNECT_DELAY).await;
                continue;
            }
        };
        if let Err(err) = listener.listen(&channel).await {
            tracing::warn!(%collection, %err, "watch LISTEN failed, retrying");
            tokio::time::sleep(LISTEN_RECONNECT_DELAY).await;
            continue;
        }

        loop {
            let woke_early = tokio::select! {
                notice = listener.try_recv() => matches!(notice, Ok(Some(_))),
                _ = tokio::time::sleep(POLL_INTERVAL) => false,
            };
            let _ = woke_early;

            match poll_once(&pool, &collection, &mut known).await {
                Ok(events) => {
                    for event in events {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(%collection, %err, "watch poll failed");
                    break;
                }
            }
        }
    }
}

async fn load_known_versions(
    pool: &PgPool,
    collection: &str,
) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows = sqlx::query(&format!("SELECT id, version FROM {collection}"))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get::<String, _>("id"), r.get::<i64, _>("version")))
        .collect())
}

async fn fetch_doc(pool: &PgPool, collection: &str, id: &str) -> Option<Value> {
    sqlx::query(&format!("SELECT doc FROM {collection} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .map(|r| r.get::<Value, _>("doc"))
}

async fn poll_once(
    pool: &PgPool,
    collection: &str,
    known: &mut HashMap<String, i64>,
) -> Result<Vec<ChangeEvent>, sqlx::Error> {
    let rows = sqlx::query(&format!("SELECT id, doc, version FROM {collection}"))
        .fetch_all(pool)
        .await?;

    let mut seen = std::collections::HashSet::new();
    let mut events = Vec::new();

    for row in rows {
        let id: String = row.get("id");
        let version: i64 = row.get("version");
        let doc: Value = row.get("doc");
        seen.insert(id.clone());

        match known.get(&id) {
            None => {
                events.push(ChangeEvent {
                    kind: ChangeKind::Added,
                    meta: ChangeMetadata {
                        collection: collection.to_string(),
                        id: id.clone(),
                        version,
                    },
                    doc: Some(doc),
                });
            }
            Some(prev) if *prev != version => {
                events.push(ChangeEvent {
                    kind: ChangeKind::Modified,
                    meta: ChangeMetadata {
                        collection: collection.to_string(),
                        id: id.clone(),
                        version,
                    },
                    doc: Some(doc),
                });
            }
            _ => {}
        }
        known.insert(id, version);
    }

    let removed: Vec<String> = known
        .keys()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect();
    for id in removed {
        let version = known.remove(&id).unwrap_or_default();
        events.push(ChangeEvent {
            kind: ChangeKind::Removed,
            meta: ChangeMetadata {
                collection: collection.to_string(),
                id,
                version,
            },
            doc: None,
        });
    }

    Ok(events)
}
