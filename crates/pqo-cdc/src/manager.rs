//! `SubscriptionManager` (spec §4.10): `Subscribe`/`Unsubscribe` plus a
//! cleanup hook that releases every outstanding subscription and its timers.

use std::collections::HashMap;
use std::sync::Mutex;

use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pqo_config::CdcConfig;

use crate::subscription::{run_subscription, Callback, Filters};

struct Handle {
    task: JoinHandle<()>,
    shutdown: mpsc::Sender<()>,
}

pub struct SubscriptionManager {
    pool: PgPool,
    config: CdcConfig,
    subscriptions: Mutex<HashMap<String, Handle>>,
}

impl SubscriptionManager {
    pub fn new(pool: PgPool, config: CdcConfig) -> Self {
        Self { pool, config, subscriptions: Mutex::new(HashMap::new()) }
    }

    /// Opens a server-side stream over `collection`, narrowed by `filters`,
    /// and delivers debounced/batched changes to `callback`. Returns a
    /// subscription id for later `unsubscribe`.
    pub fn subscribe(&self, collection: impl Into<String>, filters: Filters, callback: Callback) -> String {
        let subscription_id = uuid::Uuid::new_v4().to_string();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(run_subscription(self.pool.clone(), collection.into(), filters, self.config.clone(), callback, shutdown_rx));

        self.subscriptions.lock().unwrap().insert(subscription_id.clone(), Handle { task, shutdown: shutdown_tx });
        subscription_id
    }

    /// Cancels the stream and clears its buffers. A missing id is a silent
    /// no-op, matching the idempotent-release convention used elsewhere in
    /// this codebase.
    pub async fn unsubscribe(&self, subscription_id: &str) {
        let handle = self.subscriptions.lock().unwrap().remove(subscription_id);
        if let Some(handle) = handle {
            let _ = handle.shutdown.send(()).await;
            handle.task.abort();
        }
    }

    /// Releases every outstanding subscription. Intended for host shutdown.
    pub async fn release_all(&self) {
        let handles: Vec<Handle> = {
            let mut subs = self.subscriptions.lock().unwrap();
            subs.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            let _ = handle.shutdown.send(()).await;
            handle.task.abort();
        }
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }
}
