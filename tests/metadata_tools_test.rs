//! Tests for the metadata and status tools against in-memory SQLite.

use std::time::Duration;

use clap::Parser;
use sqlgate_mcp::config::Config;
use sqlgate_mcp::db::pool::{DbPool, PoolSettings};
use sqlgate_mcp::tools::{self, GateContext};

async fn seeded_context() -> GateContext {
    let config = Config::parse_from(["sqlgate-mcp", "--database-url", "sqlite::memory:"]);
    let settings = PoolSettings {
        max_connections: 1,
        acquire_timeout: Duration::from_secs(5),
        writable: true,
    };
    let pool = DbPool::connect("sqlite::memory:", &settings).await.unwrap();
    let DbPool::Sqlite(ref raw) = pool else {
        unreachable!()
    };
    sqlx::query("CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL NOT NULL)")
        .execute(raw)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT)")
        .execute(raw)
        .await
        .unwrap();
    sqlx::query("CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100")
        .execute(raw)
        .await
        .unwrap();
    GateContext::new(config, pool)
}

#[tokio::test]
async fn list_schemas_names_main() {
    let ctx = seeded_context().await;
    let output = tools::schema::list_schemas(&ctx).await;
    assert!(output.contains("schema_name"), "output: {}", output);
    assert!(output.contains("main"), "output: {}", output);
}

#[tokio::test]
async fn list_tables_includes_tables_and_views() {
    let ctx = seeded_context().await;
    let output = tools::schema::list_tables(&ctx, None, None).await;
    assert!(output.contains("orders"), "output: {}", output);
    assert!(output.contains("customers"), "output: {}", output);
    assert!(output.contains("big_orders"), "output: {}", output);
    assert!(output.contains("view"), "output: {}", output);
}

#[tokio::test]
async fn list_tables_zero_limit_is_rejected() {
    let ctx = seeded_context().await;
    let output = tools::schema::list_tables(&ctx, None, Some(0)).await;
    assert!(output.starts_with("ERROR: PolicyViolation:"), "output: {}", output);
}

#[tokio::test]
async fn list_tables_respects_small_limit() {
    let ctx = seeded_context().await;
    let output = tools::schema::list_tables(&ctx, None, Some(1)).await;
    // Alphabetical: only big_orders survives the limit
    assert!(output.contains("big_orders"), "output: {}", output);
    assert!(!output.contains("customers"), "output: {}", output);
}

#[tokio::test]
async fn schema_discovery_returns_json_columns_with_nullability() {
    let ctx = seeded_context().await;
    let output = tools::schema::schema_discovery(&ctx, None).await;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
    let total = rows
        .iter()
        .find(|r| r["table_name"] == "orders" && r["column_name"] == "total")
        .unwrap();
    assert_eq!(total["data_type"], "REAL");
    assert_eq!(total["is_nullable"], "NO");
}

#[tokio::test]
async fn get_database_info_reports_identity_and_limits() {
    let ctx = seeded_context().await;
    let output = tools::schema::get_database_info(&ctx).await;
    let info: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(info["database_type"], "sqlite");
    assert_eq!(info["database_name"], "main");
    assert_eq!(info["query_mode"], "read_only");
    assert_eq!(info["max_rows"], 50_000);
    assert!(info["server_version"].is_string());
}

#[tokio::test]
async fn get_policy_info_is_parseable_and_names_banned_verbs() {
    let ctx = seeded_context().await;
    let output = tools::status::get_policy_info(&ctx).await;
    let info: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(info["query_mode"], "read_only");
    let banned: Vec<String> = info["banned_verbs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(banned.contains(&"DROP".to_string()));
    assert!(banned.contains(&"INSERT".to_string()));
}

#[tokio::test]
async fn check_db_connection_reports_ok() {
    let ctx = seeded_context().await;
    let output = tools::status::check_db_connection(&ctx).await;
    assert!(output.starts_with('✓'), "output: {}", output);
    assert!(output.contains("sqlite"), "output: {}", output);
}

#[tokio::test]
async fn metadata_execution_holds_the_in_flight_gauge() {
    let ctx = std::sync::Arc::new(seeded_context().await);
    // Hold the pool's only connection so the metadata query stays pending
    let DbPool::Sqlite(ref raw) = ctx.pool else {
        unreachable!()
    };
    let held = raw.acquire().await.unwrap();

    let task = tokio::spawn({
        let ctx = ctx.clone();
        async move { tools::schema::list_schemas(&ctx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.metrics.in_flight(), 1);

    drop(held);
    let output = task.await.unwrap();
    assert!(output.contains("main"), "output: {}", output);
    assert_eq!(ctx.metrics.in_flight(), 0);
}

#[tokio::test]
async fn metadata_tools_record_metrics() {
    let ctx = seeded_context().await;
    tools::schema::list_tables(&ctx, None, None).await;
    tools::schema::list_schemas(&ctx).await;
    assert_eq!(ctx.metrics.executed_count("list_tables", "success"), 1);
    assert_eq!(ctx.metrics.executed_count("list_schemas", "success"), 1);
}
