//! `pqo-cli reconcile` — run an out-of-cycle duplicate sweep from the
//! command line, for ops use when the daemon's periodic loop can't wait.

use anyhow::Result;
use pqo_reconcile::Reconciler;

pub async fn run(freshness_minutes: i64) -> Result<()> {
    let url = std::env::var(pqo_db::ENV_DB_URL)?;
    let pool = sqlx::PgPool::connect(&url).await?;
    let mut reconciler = Reconciler::new(pool, chrono::Duration::minutes(freshness_minutes));

    let report = reconciler.run_once().await?;
    println!("quotations_cancelled={}", report.quotations_cancelled.len());
    for id in &report.quotations_cancelled {
        println!("  cancelled={id}");
    }
    println!("orders_flagged={}", report.orders_flagged.len());
    for id in &report.orders_flagged {
        println!("  flagged={id}");
    }
    println!("errors={}", report.errors.len());
    for err in &report.errors {
        eprintln!("  error={err}");
    }
    println!("clean={}", reconciler.is_clean());
    Ok(())
}
