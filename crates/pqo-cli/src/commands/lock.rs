//! `pqo-cli lock` — check whether a scope/resource pair is currently held.

use anyhow::Result;
use pqo_config::LockConfig;
use pqo_lock::LockManager;

pub async fn status(scope: String, resource_id: String) -> Result<()> {
    let url = std::env::var(pqo_db::ENV_DB_URL)?;
    let pool = sqlx::PgPool::connect(&url).await?;
    let manager = LockManager::new(pool, LockConfig::from_env());

    let locked = manager.is_locked(&scope, &resource_id).await?;
    println!("scope={scope}");
    println!("resource_id={resource_id}");
    println!("locked={locked}");
    Ok(())
}
