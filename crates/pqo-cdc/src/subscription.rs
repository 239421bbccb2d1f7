//! One subscription's debounce/batch/reconnect loop (spec §4.10).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use pqo_config::CdcConfig;
use pqo_db::store::ChangeKind;
use pqo_db::watch::watch_collection;
use sqlx::PgPool;

use crate::apply::ChangeRecord;

pub type Callback = Arc<dyn Fn(Vec<ChangeRecord>) + Send + Sync>;

/// Filters narrow a watched collection to documents whose top-level fields
/// match every `(key, value)` pair.
pub type Filters = HashMap<String, serde_json::Value>;

pub(crate) async fn run_subscription(
    pool: PgPool,
    collection: String,
    filters: Filters,
    config: CdcConfig,
    callback: Callback,
    mut shutdown: mpsc::Receiver<()>,
) {
    let mut attempt: u32 = 0;

    'reconnect: loop {
        let mut stream = watch_collection(pool.clone(), collection.clone());
        let mut batch: Vec<ChangeRecord> = Vec::new();
        let mut debounce = tokio::time::interval(config.debounce);
        debounce.reset();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    return;
                }
                _ = debounce.tick() => {
                    if !batch.is_empty() {
                        flush(&mut batch, &config, &callback);
                    }
                }
                event = stream.next() => {
                    match event {
                        Some(event) => {
                            attempt = 0;
                            if !passes_filters(&event.doc, &filters) {
                                continue;
                            }
                            batch.push(ChangeRecord { kind: event.kind, id: event.meta.id, doc: event.doc });
                            if batch.len() as u32 >= config.max_batch {
                                flush(&mut batch, &config, &callback);
                            }
                        }
                        None => {
                            // The underlying watch stream ended — a
                            // network-class condition from this layer's
                            // point of view. Unsubscribe/re-subscribe with
                            // backoff.
                            attempt += 1;
                            if attempt > config.max_reconnect_attempts {
                                tracing::error!(%collection, attempt, "cdc subscription exhausted reconnect attempts, giving up");
                                return;
                            }
                            let delay = config.reconnect_delay * attempt;
                            tracing::warn!(%collection, attempt, ?delay, "cdc stream ended, reconnecting");
                            tokio::time::sleep(delay).await;
                            continue 'reconnect;
                        }
                    }
                }
            }
        }
    }
}

/// Flush caps the batch at `maxBatchSize`: older changes are evicted from
/// *this* batch only, never carried across batches.
fn flush(batch: &mut Vec<ChangeRecord>, config: &CdcConfig, callback: &Callback) {
    let max = config.max_batch as usize;
    let to_deliver: Vec<ChangeRecord> = if batch.len() > max {
        batch.split_off(batch.len() - max)
    } else {
        std::mem::take(batch)
    };
    batch.clear();
    callback(to_deliver);
}

fn passes_filters(doc: &Option<serde_json::Value>, filters: &Filters) -> bool {
    if filters.is_empty() {
        return true;
    }
    match doc {
        Some(doc) => filters.iter().all(|(key, expected)| doc.get(key) == Some(expected)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filters_always_pass() {
        assert!(passes_filters(&Some(json!({"a": 1})), &Filters::new()));
    }

    #[test]
    fn filters_require_exact_field_match() {
        let mut filters = Filters::new();
        filters.insert("status".to_string(), json!("open"));
        assert!(passes_filters(&Some(json!({"status": "open"})), &filters));
        assert!(!passes_filters(&Some(json!({"status": "closed"})), &filters));
    }

    #[test]
    fn flush_caps_batch_at_max_size_keeping_the_newest() {
        let mut batch = vec![
            ChangeRecord { kind: ChangeKind::Added, id: "1".into(), doc: None },
            ChangeRecord { kind: ChangeKind::Added, id: "2".into(), doc: None },
            ChangeRecord { kind: ChangeKind::Added, id: "3".into(), doc: None },
        ];
        let config = CdcConfig { debounce: Duration::from_millis(1), max_batch: 2, reconnect_delay: Duration::from_millis(1), max_reconnect_attempts: 1 };
        let delivered = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let captured = delivered.clone();
        let callback: Callback = Arc::new(move |records| *captured.lock().unwrap() = records);
        flush(&mut batch, &config, &callback);
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].id, "2");
        assert_eq!(delivered[1].id, "3");
    }
}
