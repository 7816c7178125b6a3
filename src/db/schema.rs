//! Metadata queries.
//!
//! Schema, table, and column listings are served from fixed query templates
//! per backend. The only caller-controlled pieces are a schema name filter
//! (embedded as an escaped string literal) and a numeric row limit validated
//! by the tool layer, so callers can never inject into these statements.
//!
//! Metadata queries run with their own timeout and row cap, relaxed relative
//! to user queries.

use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use crate::config::SCHEMA_ROW_LIMIT;
use crate::db::executor::{ExecutionPipeline, ExecutionResult};
use crate::db::pool::{DatabaseType, DbPool};
use crate::error::{GateError, GateResult};

/// Double single quotes so a value can sit inside a SQL string literal.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Read-only metadata access over an existing pool.
#[derive(Debug, Clone)]
pub struct SchemaInspector {
    schema_timeout: Duration,
}

impl SchemaInspector {
    pub fn new(schema_timeout: Duration) -> Self {
        Self { schema_timeout }
    }

    /// List schemas (namespaces) visible in the database.
    pub async fn list_schemas(
        &self,
        pipeline: &ExecutionPipeline,
        pool: &DbPool,
    ) -> GateResult<ExecutionResult> {
        let sql = match pool.db_type() {
            DatabaseType::Postgres | DatabaseType::MySql => {
                "SELECT schema_name FROM information_schema.schemata ORDER BY schema_name"
            }
            DatabaseType::Sqlite => "SELECT name AS schema_name FROM pragma_database_list ORDER BY name",
        };
        pipeline
            .execute_with(pool, sql, self.schema_timeout, SCHEMA_ROW_LIMIT)
            .await
    }

    /// List tables and views, optionally filtered to one schema.
    ///
    /// The limit must already be validated; it is interpolated as a plain
    /// integer.
    pub async fn list_tables(
        &self,
        pipeline: &ExecutionPipeline,
        pool: &DbPool,
        schema: Option<&str>,
        limit: u32,
    ) -> GateResult<ExecutionResult> {
        let sql = match pool.db_type() {
            DatabaseType::Postgres => {
                let filter = match schema {
                    Some(s) => format!("table_schema = '{}'", escape_literal(s)),
                    None => {
                        "table_schema NOT IN ('pg_catalog', 'information_schema')".to_string()
                    }
                };
                format!(
                    "SELECT table_schema, table_name, table_type \
                     FROM information_schema.tables WHERE {} \
                     ORDER BY table_schema, table_name LIMIT {}",
                    filter, limit
                )
            }
            DatabaseType::MySql => {
                let filter = match schema {
                    Some(s) => format!("table_schema = '{}'", escape_literal(s)),
                    None => "table_schema = database()".to_string(),
                };
                format!(
                    "SELECT table_schema, table_name, table_type \
                     FROM information_schema.tables WHERE {} \
                     ORDER BY table_schema, table_name LIMIT {}",
                    filter, limit
                )
            }
            DatabaseType::Sqlite => format!(
                "SELECT name AS table_name, type AS table_type FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name LIMIT {}",
                limit
            ),
        };
        pipeline
            .execute_with(pool, &sql, self.schema_timeout, SCHEMA_ROW_LIMIT)
            .await
    }

    /// Column-level inventory of the database, optionally filtered to one
    /// schema.
    pub async fn schema_discovery(
        &self,
        pipeline: &ExecutionPipeline,
        pool: &DbPool,
        schema: Option<&str>,
    ) -> GateResult<ExecutionResult> {
        let sql = match pool.db_type() {
            DatabaseType::Postgres => {
                let filter = match schema {
                    Some(s) => format!("table_schema = '{}'", escape_literal(s)),
                    None => {
                        "table_schema NOT IN ('pg_catalog', 'information_schema')".to_string()
                    }
                };
                format!(
                    "SELECT table_schema, table_name, column_name, data_type, is_nullable \
                     FROM information_schema.columns WHERE {} \
                     ORDER BY table_schema, table_name, ordinal_position",
                    filter
                )
            }
            DatabaseType::MySql => {
                let filter = match schema {
                    Some(s) => format!("table_schema = '{}'", escape_literal(s)),
                    None => "table_schema = database()".to_string(),
                };
                format!(
                    "SELECT table_schema, table_name, column_name, data_type, is_nullable \
                     FROM information_schema.columns WHERE {} \
                     ORDER BY table_schema, table_name, ordinal_position",
                    filter
                )
            }
            DatabaseType::Sqlite => "SELECT m.name AS table_name, p.name AS column_name, \
                 p.type AS data_type, CASE p.\"notnull\" WHEN 0 THEN 'YES' ELSE 'NO' END AS is_nullable \
                 FROM sqlite_master m JOIN pragma_table_info(m.name) p \
                 WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' \
                 ORDER BY m.name, p.cid"
                .to_string(),
        };
        pipeline
            .execute_with(pool, &sql, self.schema_timeout, SCHEMA_ROW_LIMIT)
            .await
    }

    /// Server identity and effective limits as a JSON document.
    pub async fn database_info(
        &self,
        pool: &DbPool,
        mode: &str,
        max_rows: usize,
        query_timeout_secs: u64,
    ) -> serde_json::Value {
        json!({
            "database_type": pool.db_type().as_str(),
            "database_name": pool.database_name().await,
            "server_version": pool.server_version().await,
            "query_mode": mode,
            "max_rows": max_rows,
            "query_timeout_secs": query_timeout_secs,
        })
    }

    /// Connectivity probe with a short fixed deadline.
    pub async fn check(&self, pool: &DbPool, probe_timeout: Duration) -> GateResult<()> {
        match timeout(probe_timeout, pool.ping()).await {
            Ok(result) => result,
            Err(_) => Err(GateError::timeout(probe_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::PoolSettings;

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("public"), "public");
        assert_eq!(escape_literal("o'brien"), "o''brien");
        assert_eq!(escape_literal("a''b"), "a''''b");
    }

    async fn seeded_pool() -> DbPool {
        // A single connection so the in-memory database is shared across
        // statements.
        let settings = PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            writable: true,
        };
        let pool = DbPool::connect("sqlite::memory:", &settings).await.unwrap();
        let DbPool::Sqlite(ref raw) = pool else {
            unreachable!()
        };
        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .execute(raw)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_list_tables_sqlite() {
        let pool = seeded_pool().await;
        let pipeline = ExecutionPipeline::new(Duration::from_secs(5), 100);
        let inspector = SchemaInspector::new(Duration::from_secs(5));
        let result = inspector
            .list_tables(&pipeline, &pool, None, 200)
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["table_name", "table_type"]);
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_schema_discovery_sqlite() {
        let pool = seeded_pool().await;
        let pipeline = ExecutionPipeline::new(Duration::from_secs(5), 100);
        let inspector = SchemaInspector::new(Duration::from_secs(5));
        let result = inspector
            .schema_discovery(&pipeline, &pool, None)
            .await
            .unwrap();
        // Two columns in the users table
        assert_eq!(result.rows.len(), 2);
        assert!(result.columns.contains(&"column_name".to_string()));
    }

    #[tokio::test]
    async fn test_check_succeeds_on_live_pool() {
        let pool = seeded_pool().await;
        let inspector = SchemaInspector::new(Duration::from_secs(5));
        inspector
            .check(&pool, Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_database_info_shape() {
        let pool = seeded_pool().await;
        let inspector = SchemaInspector::new(Duration::from_secs(5));
        let info = inspector.database_info(&pool, "read_only", 50_000, 30).await;
        assert_eq!(info["database_type"], "sqlite");
        assert_eq!(info["query_mode"], "read_only");
        assert_eq!(info["max_rows"], 50_000);
    }
}
