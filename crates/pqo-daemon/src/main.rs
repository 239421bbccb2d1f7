//! pqo-daemon entry point.
//!
//! Thin on purpose: builds the shared state in the documented init order
//! (DocStore → Event Store → Lock Manager + Outbox → Quotation/Order
//! services → Stock Monitor + CDC), wires HTTP middleware, and starts the
//! server and background tasks.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use pqo_config::{CdcConfig, LockConfig, OutboxConfig, StockMonitorConfig};
use pqo_daemon::{routes, state::AppState};
use pqo_lock::LockManager;
use pqo_outbox::Dispatcher;
use pqo_reconcile::Reconciler;
use pqo_stock_monitor::StockMonitor;
use tokio::sync::{watch, RwLock};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    // DocStore first, per spec §9's init order.
    let store = pqo_db::connect_from_env().await.context("connect to document store")?;
    let pool = store.pool().clone();

    // Event Store is free functions over a transaction (`pqo_eventstore::append_in_tx`);
    // there is no standalone object to construct.

    let locks = LockManager::new(pool.clone(), LockConfig::from_env());
    let outbox = Dispatcher::new(pool.clone(), OutboxConfig::from_env());
    register_outbox_handlers(&outbox);

    // State Machine (pqo-quotation) and Order Service are stateless handles
    // constructed fresh per request by whatever calls them; pqo-daemon only
    // needs to keep the Stock Monitor, CDC manager, Outbox dispatcher, and
    // Reconciler alive for the process lifetime.
    let stock_monitor = StockMonitor::new(pool.clone(), locks.clone(), StockMonitorConfig::from_env());
    let cdc = Arc::new(pqo_cdc::SubscriptionManager::new(pool.clone(), CdcConfig::from_env()));
    let reconciler = Arc::new(RwLock::new(Reconciler::new(pool.clone(), chrono::Duration::minutes(10))));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_handle = outbox.clone();
    let dispatcher_shutdown = shutdown_rx.clone();
    tokio::spawn(async move { dispatcher_handle.run(dispatcher_shutdown).await });
    tokio::spawn(stock_monitor.run(shutdown_rx.clone()));
    tokio::spawn(run_reconcile_loop(reconciler.clone(), shutdown_rx.clone()));

    let shared = AppState::new(pool, outbox, reconciler, cdc);

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));
    info!("pqo-daemon listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(tokio::net::TcpListener::bind(addr).await?, app) => {
            result.context("server crashed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("PQO_DAEMON_ADDR").ok()?.parse().ok()
}

fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = ["http://localhost", "http://127.0.0.1", "http://localhost:3000", "http://127.0.0.1:3000"];
    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new().allow_origin(origins).allow_methods([Method::GET, Method::POST]).allow_headers(tower_http::cors::Any)
}

/// Registers stub handlers for the message types `pqo-quotation` raises.
/// The mail transport and push/notification sink are external collaborators
/// (spec §2's out-of-scope list); these handlers log the delivery attempt
/// and succeed, so a production deployment only needs to swap the closure
/// body for a real transport call without touching the dispatch/retry path.
fn register_outbox_handlers(outbox: &Dispatcher) {
    for message_type in ["email_quotation_request", "email_reminder", "push_status_change"] {
        let owned_type = message_type.to_string();
        outbox.register_handler(
            message_type,
            Arc::new(move |payload, _meta| {
                let owned_type = owned_type.clone();
                Box::pin(async move {
                    tracing::info!(message_type = %owned_type, %payload, "dispatched outbox message");
                    Ok(())
                })
            }),
        );
    }
}

async fn run_reconcile_loop(reconciler: Arc<RwLock<Reconciler>>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(300));
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = reconciler.write().await.run_once().await {
                    tracing::error!(%err, "reconciler sweep failed");
                }
            }
        }
    }
}
