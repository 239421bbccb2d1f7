//! `DocStore` trait and its Postgres implementation.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;

use crate::error::DocStoreError;
use crate::query::{FilterOp, Page, Query};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One operation in an atomic [`DocStore::batch_write`] call.
#[derive(Clone, Debug)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        doc: Value,
    },
    Update {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

#[async_trait]
pub trait DocStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, DocStoreError>;
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), DocStoreError>;
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), DocStoreError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocStoreError>;
    async fn query(&self, collection: &str, query: Query) -> Result<Page, DocStoreError>;
    /// At most a large-but-bounded batch executes atomically.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), DocStoreError>;
}

/// Maximum operations accepted by a single `batch_write` call.
pub const MAX_BATCH_SIZE: usize = 500;

/// Deep-merge `patch` into `base` (objects merge recursively; scalars and
/// arrays are overwritten) — this is `Update`'s "merge" semantics.
fn merge_patch(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                if v.is_null() {
                    base_map.remove(&k);
                    continue;
                }
                match base_map.get_mut(&k) {
                    Some(existing) => merge_patch(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base_slot, patch_val) => {
            *base_slot = patch_val;
        }
    }
}

/// A handle to an in-flight transaction passed into the closure given to
/// [`PgDocStore::run_in_transaction`]. Cloning shares the same underlying
/// transaction (serialized behind a mutex) so the closure can perform
/// several reads and writes before the caller commits or rolls back.
#[derive(Clone)]
pub struct PgTxHandle {
    tx: Arc<Mutex<Transaction<'static, Postgres>>>,
}

impl PgTxHandle {
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, DocStoreError> {
        let mut tx = self.tx.lock().await;
        let row = sqlx::query(&format!(
            "SELECT doc FROM {} WHERE id = $1",
            quote_ident(collection)
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|r| r.get::<Value, _>("doc")))
    }

    pub async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), DocStoreError> {
        let mut tx = self.tx.lock().await;
        sqlx::query(&format!(
            "INSERT INTO {table} (id, doc, version, updated_at)
             VALUES ($1, $2, 0, now())
             ON CONFLICT (id) DO UPDATE SET doc = $2, version = {table}.version + 1, updated_at = now()",
            table = quote_ident(collection)
        ))
        .bind(id)
        .bind(&doc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), DocStoreError> {
        let mut tx = self.tx.lock().await;
        let table = quote_ident(collection);
        let row = sqlx::query(&format!("SELECT doc FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        let mut doc = match row {
            Some(r) => r.get::<Value, _>("doc"),
            None => return Err(DocStoreError::NotFound(format!("{collection}/{id}"))),
        };
        merge_patch(&mut doc, patch);
        sqlx::query(&format!(
            "UPDATE {table} SET doc = $2, version = version + 1, updated_at = now() WHERE id = $1"
        ))
        .bind(id)
        .bind(&doc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), DocStoreError> {
        let mut tx = self.tx.lock().await;
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", quote_ident(collection)))
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn quote_ident(ident: &str) -> String {
    // Collections are internal, fixed identifiers (see migrations); still
    // reject anything that isn't a plain lowercase/underscore token so a
    // caller-supplied collection name can never smuggle SQL.
    assert!(
        ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "invalid collection name: {ident}"
    );
    ident.to_string()
}

/// Postgres implementation of [`DocStore`] (spec §4.1).
#[derive(Clone)]
pub struct PgDocStore {
    pool: PgPool,
}

impl PgDocStore {
    pub async fn connect(database_url: &str) -> Result<Self, DocStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), DocStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DocStoreError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Run `f` against a consistent transactional snapshot. Serializable
    /// conflicts surface as a retryable [`DocStoreError::Unavailable`];
    /// callers retry with backoff (spec §4.1, §4.2).
    pub async fn run_in_transaction<F, Fut, T>(&self, f: F) -> Result<T, DocStoreError>
    where
        F: FnOnce(PgTxHandle) -> Fut,
        Fut: Future<Output = Result<T, DocStoreError>>,
    {
        let tx = self.pool.begin().await?;
        let shared = Arc::new(Mutex::new(tx));
        let handle = PgTxHandle { tx: shared.clone() };

        let result = f(handle).await;

        let tx = Arc::try_unwrap(shared)
            .map_err(|_| DocStoreError::Internal("transaction handle outlived closure".into()))?
            .into_inner();

        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }
}

#[async_trait]
impl DocStore for PgDocStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, DocStoreError> {
        let row = sqlx::query(&format!(
            "SELECT doc FROM {} WHERE id = $1",
            quote_ident(collection)
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<Value, _>("doc")))
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), DocStoreError> {
        self.run_in_transaction(|tx| async move { tx.set(collection, id, doc).await })
            .await
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), DocStoreError> {
        self.run_in_transaction(|tx| async move { tx.update(collection, id, patch).await })
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocStoreError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", quote_ident(collection)))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Page, DocStoreError> {
        let table = quote_ident(collection);
        let mut sql = format!("SELECT id, doc FROM {table}");
        let mut binds: Vec<Value> = Vec::new();

        if !query.filters.is_empty() {
            let mut clauses = Vec::new();
            for (idx, f) in query.filters.iter().enumerate() {
                let op = match f.op {
                    FilterOp::Eq => "=",
                    FilterOp::Lt => "<",
                    FilterOp::Lte => "<=",
                    FilterOp::Gt => ">",
                    FilterOp::Gte => ">=",
                };
                clauses.push(format!("doc -> '{}' {} ${}", f.field.replace('\'', ""), op, idx + 1));
                binds.push(f.value.clone());
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some((field, order)) = &query.order_by {
            let dir = match order {
                crate::query::SortOrder::Asc => "ASC",
                crate::query::SortOrder::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY doc -> '{}' {}", field.replace('\'', ""), dir));
        }

        let limit = query.limit.unwrap_or(100).min(1000);
        sql.push_str(&format!(" LIMIT {}", limit + 1));

        let mut q = sqlx::query(&sql);
        for b in &binds {
            q = q.bind(b);
        }
        let mut rows = q.fetch_all(&self.pool).await?;

        let has_more = rows.len() as u32 > limit;
        if has_more {
            rows.truncate(limit as usize);
        }

        let next_cursor = if has_more {
            rows.last().map(|r| r.get::<String, _>("id"))
        } else {
            None
        };

        let items = rows
            .into_iter()
            .map(|r| (r.get::<String, _>("id"), r.get::<Value, _>("doc")))
            .collect();

        Ok(Page { items, next_cursor })
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), DocStoreError> {
        if ops.len() > MAX_BATCH_SIZE {
            return Err(DocStoreError::FailedPrecondition(format!(
                "batch of {} exceeds max {}",
                ops.len(),
                MAX_BATCH_SIZE
            )));
        }
        self.run_in_transaction(|tx| async move {
            for op in ops {
                match op {
                    WriteOp::Set { collection, id, doc } => tx.set(&collection, &id, doc).await?,
                    WriteOp::Update { collection, id, patch } => tx.update(&collection, &id, patch).await?,
                    WriteOp::Delete { collection, id } => tx.delete(&collection, &id).await?,
                }
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_patch_merges_objects_recursively() {
        let mut base = json!({"a": 1, "b": {"c": 2, "d": 3}});
        let patch = json!({"b": {"c": 9}, "e": 5});
        merge_patch(&mut base, patch);
        assert_eq!(base, json!({"a": 1, "b": {"c": 9, "d": 3}, "e": 5}));
    }

    #[test]
    fn merge_patch_null_removes_key() {
        let mut base = json!({"a": 1, "b": 2});
        merge_patch(&mut base, json!({"b": null}));
        assert_eq!(base, json!({"a": 1}));
    }

    #[test]
    fn merge_patch_overwrites_arrays() {
        let mut base = json!({"items": [1, 2, 3]});
        merge_patch(&mut base, json!({"items": [9]}));
        assert_eq!(base, json!({"items": [9]}));
    }

    #[test]
    #[should_panic(expected = "invalid collection name")]
    fn quote_ident_rejects_unsafe_names() {
        quote_ident("quotations; DROP TABLE x; --");
    }
}
