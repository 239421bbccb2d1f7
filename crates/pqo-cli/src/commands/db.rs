//! `pqo-cli db` — document store connectivity and migration status.

use anyhow::Result;
use pqo_db::PgDocStore;

pub async fn status() -> Result<()> {
    let url = std::env::var(pqo_db::ENV_DB_URL)?;
    let store = PgDocStore::connect(&url).await?;
    sqlx::query("SELECT 1").execute(store.pool()).await?;
    println!("db_ok=true");
    Ok(())
}

pub async fn migrate() -> Result<()> {
    let url = std::env::var(pqo_db::ENV_DB_URL)?;
    let store = PgDocStore::connect(&url).await?;
    store.migrate().await?;
    println!("migrations_applied=true");
    Ok(())
}
