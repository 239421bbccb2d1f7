//! pqo-db — the typed, transactional `DocStore` interface (spec §4.1) and
//! its production Postgres implementation.
//!
//! # Concrete backend
//!
//! Per spec §4.1 the interface is backend-agnostic; this crate commits to
//! ONE concrete backend, Postgres via `sqlx`. Each "collection" is a table:
//!
//! ```sql
//! CREATE TABLE <collection> (
//!     id          TEXT PRIMARY KEY,
//!     doc         JSONB NOT NULL,
//!     version     BIGINT NOT NULL DEFAULT 0,
//!     updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```
//!
//! `Watch` has no native Postgres equivalent to a Firestore change stream;
//! see [`watch::watch_collection`] for the chosen trigger+poll design.

pub mod error;
pub mod query;
pub mod store;
pub mod watch;

pub use error::DocStoreError;
pub use query::{Page, Query, QueryFilter, SortOrder};
pub use store::{ChangeKind, DocStore, PgDocStore, WriteOp};
pub use watch::{ChangeEvent, ChangeMetadata};

pub const ENV_DB_URL: &str = "PQO_DATABASE_URL";

/// Connect to Postgres using `PQO_DATABASE_URL` and run embedded migrations.
pub async fn connect_from_env() -> anyhow::Result<PgDocStore> {
    use anyhow::Context;
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    let store = PgDocStore::connect(&url).await?;
    store.migrate().await?;
    Ok(store)
}
