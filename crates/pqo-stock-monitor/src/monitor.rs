//! Watches `products`, debounces low-stock events per supplier, and fires a
//! dedup-locked auto-quotation attempt per buffered product (spec §4.8).

use std::time::Duration;

use sqlx::PgPool;
use tokio_stream::StreamExt;

use pqo_config::StockMonitorConfig;
use pqo_db::store::ChangeKind;
use pqo_db::watch::watch_collection;
use pqo_lock::{AcquireOptions, LockManager};
use pqo_schemas::inventory::Product;

use crate::auto_quote::{create_or_reset_auto_quotation, AutoQuoteOutcome};
use crate::buffer::DebounceBuffers;

pub struct StockMonitor {
    pool: PgPool,
    locks: LockManager,
    config: StockMonitorConfig,
}

impl StockMonitor {
    pub fn new(pool: PgPool, locks: LockManager, config: StockMonitorConfig) -> Self {
        Self { pool, locks, config }
    }

    /// Runs until `shutdown` fires. Intended to be spawned as a background
    /// task by the host (spec §9's init order: Stock Monitor starts after
    /// the Lock Manager and Outbox are wired up).
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut stream = watch_collection(self.pool.clone(), "products".to_string());
        let mut buffers = DebounceBuffers::new(self.config.debounce);
        let mut ticker = tokio::time::interval(Duration::from_millis(200));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.flush_ready(&mut buffers).await;
                }
                event = stream.next() => {
                    match event {
                        Some(event) => self.observe(&mut buffers, event),
                        None => break,
                    }
                }
            }
        }
    }

    fn observe(&self, buffers: &mut DebounceBuffers, event: pqo_db::watch::ChangeEvent) {
        if !matches!(event.kind, ChangeKind::Added | ChangeKind::Modified) {
            return;
        }
        let Some(doc) = event.doc else { return };
        let Ok(product) = serde_json::from_value::<Product>(doc) else {
            tracing::warn!(product_id = %event.meta.id, "could not decode product document, skipping");
            return;
        };
        if !product.eligible_for_auto_request() {
            return;
        }
        let supplier_id = product.supplier.as_ref().expect("eligible_for_auto_request implies Some(supplier)").supplier_id.clone();
        buffers.push(&supplier_id, product);
    }

    async fn flush_ready(&self, buffers: &mut DebounceBuffers) {
        for (supplier_id, products) in buffers.drain_ready() {
            for product in products {
                self.fire_one(&supplier_id, &product).await;
            }
        }
    }

    async fn fire_one(&self, supplier_id: &str, product: &Product) {
        let Some(supplier) = &product.supplier else { return };
        let dedup_key = format!("{}:{}", product.id, supplier_id);

        let result = self
            .locks
            .with_lock(
                "STOCK_REQUEST",
                &dedup_key,
                AcquireOptions { ttl: Some(Duration::from_secs(5 * 60)), max_retries: Some(0), heartbeat: false },
                || async {
                    create_or_reset_auto_quotation(&self.pool, &dedup_key, supplier_id, &supplier.email, product, self.config.cooldown_days).await
                },
            )
            .await;

        match result {
            Ok(Ok(AutoQuoteOutcome::Created)) => tracing::info!(%dedup_key, "auto-generated quotation created"),
            Ok(Ok(AutoQuoteOutcome::Recreated)) => tracing::info!(%dedup_key, "auto-generated quotation recreated after cooldown"),
            Ok(Ok(AutoQuoteOutcome::SkippedActive)) => tracing::debug!(%dedup_key, "active quotation already in flight"),
            Ok(Ok(AutoQuoteOutcome::SkippedWithinCooldown)) => tracing::debug!(%dedup_key, "received quotation still within cooldown"),
            Ok(Err(err)) => tracing::error!(%dedup_key, %err, "auto-quotation write failed"),
            Err(err) => tracing::debug!(%dedup_key, %err, "dedup lock unavailable, another process is handling this product"),
        }
    }
}
