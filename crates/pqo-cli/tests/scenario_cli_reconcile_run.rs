//! Exercises `pqo-cli reconcile run` as a real subprocess against a live
//! Postgres instance, driving the binary through `assert_cmd` rather than
//! calling the command function directly.
//!
//! Requires a live PostgreSQL instance reachable via PQO_DATABASE_URL.
//! Skipped entirely when that variable is absent (CI without a DB).

#[tokio::test]
async fn reconcile_run_reports_a_clean_sweep_on_a_database_with_no_duplicates() {
    let url = match std::env::var(pqo_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: {} not set", pqo_db::ENV_DB_URL);
            return;
        }
    };

    let pool = pqo_testkit::pool().await;
    let id = format!("q-cli-{}", uuid::Uuid::new_v4());
    pqo_testkit::fixtures::insert_quotation(&pool, &id, &id, pqo_schemas::quotation::QuotationState::Pending).await;

    let mut cmd = assert_cmd::Command::cargo_bin("pqo-cli").expect("binary builds");
    cmd.env(pqo_db::ENV_DB_URL, &url).args(["reconcile", "run", "--freshness-minutes", "5"]);

    cmd.assert().success().stdout(predicates::str::contains("clean=true"));

    sqlx::query("DELETE FROM quotations WHERE id = $1").bind(&id).execute(&pool).await.ok();
}
