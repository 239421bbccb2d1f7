//! Shared runtime state for pqo-daemon.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;

use pqo_outbox::Dispatcher;
use pqo_reconcile::Reconciler;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub reconciler_clean: bool,
    pub active_cdc_subscriptions: usize,
}

/// Cloneable (Arc) handle shared across all Axum handlers. The heavy
/// domain services live behind their own crates; this struct only wires
/// the handles a handler needs.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// `Dispatcher` is internally `Arc`-backed (cheap to clone); the daemon
    /// keeps one clone running its poll loop and hands another to handlers.
    pub outbox: Dispatcher,
    pub reconciler: Arc<RwLock<Reconciler>>,
    pub cdc: Arc<pqo_cdc::SubscriptionManager>,
    started_at: Arc<Instant>,
}

impl AppState {
    pub fn new(pool: PgPool, outbox: Dispatcher, reconciler: Arc<RwLock<Reconciler>>, cdc: Arc<pqo_cdc::SubscriptionManager>) -> Self {
        Self { pool, outbox, reconciler, cdc, started_at: Arc::new(Instant::now()) }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
