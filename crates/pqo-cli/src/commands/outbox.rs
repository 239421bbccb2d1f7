//! `pqo-cli outbox` — inspect and retry dead-lettered outbox messages.

use anyhow::Result;
use pqo_config::OutboxConfig;
use pqo_outbox::Dispatcher;

async fn dispatcher() -> Result<Dispatcher> {
    let url = std::env::var(pqo_db::ENV_DB_URL)?;
    let pool = sqlx::PgPool::connect(&url).await?;
    Ok(Dispatcher::new(pool, OutboxConfig::from_env()))
}

pub async fn list_dead_letters(limit: i64) -> Result<()> {
    let dispatcher = dispatcher().await?;
    let messages = dispatcher.list_dead_letters(limit).await?;
    println!("dead_letter_count={}", messages.len());
    for message in &messages {
        println!(
            "id={} type={} aggregate={} retry_count={} last_error={}",
            message.id,
            message.message_type,
            message.aggregate_id,
            message.retry_count,
            message.last_error.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn retry(id: String) -> Result<()> {
    let dispatcher = dispatcher().await?;
    dispatcher.retry_dead_letter(&id).await?;
    println!("retried={id}");
    Ok(())
}
