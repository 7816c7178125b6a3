//! Bounded query execution.
//!
//! Every statement runs under two limits fixed at startup: a wall-clock
//! timeout covering the whole fetch, and a row cap enforced by streaming.
//! The stream is cut at `max_rows + 1` so at most one extra row is pulled to
//! detect truncation; the server never sorts or pages on the client's behalf.
//!
//! On timeout the future is dropped, which cancels the fetch and returns the
//! connection to the pool. The pool validates connections before reuse (see
//! `pool`), so an abandoned query cannot poison later requests.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::db::pool::DbPool;
use crate::db::types::{ColumnValue, DecodeRow};
use crate::error::{GateError, GateResult};

/// Rows are drained from the stream in batches of this size.
const FETCH_BATCH_SIZE: usize = 1000;

/// The outcome of a bounded execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ColumnValue>>,
    /// True when the statement produced more than `max_rows` rows.
    pub truncated: bool,
}

/// Executes statements that already passed policy. Limits are fixed at
/// construction; per-call overrides exist only for metadata queries, which
/// run with their own timeout and row cap.
#[derive(Debug, Clone)]
pub struct ExecutionPipeline {
    query_timeout: Duration,
    max_rows: usize,
}

impl ExecutionPipeline {
    pub fn new(query_timeout: Duration, max_rows: usize) -> Self {
        Self {
            query_timeout,
            max_rows,
        }
    }

    /// Execute with the configured limits.
    pub async fn execute(&self, pool: &DbPool, sql: &str) -> GateResult<ExecutionResult> {
        self.execute_with(pool, sql, self.query_timeout, self.max_rows)
            .await
    }

    /// Execute with explicit limits.
    pub async fn execute_with(
        &self,
        pool: &DbPool,
        sql: &str,
        query_timeout: Duration,
        max_rows: usize,
    ) -> GateResult<ExecutionResult> {
        debug!(
            timeout_secs = query_timeout.as_secs(),
            max_rows, "Executing statement"
        );

        match pool {
            DbPool::Postgres(p) => {
                let (columns, rows) = postgres::fetch_rows(p, sql, max_rows, query_timeout).await?;
                Ok(process_rows(columns, rows, max_rows))
            }
            DbPool::MySql(p) => {
                let (columns, rows) = mysql::fetch_rows(p, sql, max_rows, query_timeout).await?;
                Ok(process_rows(columns, rows, max_rows))
            }
            DbPool::Sqlite(p) => {
                let (columns, rows) = sqlite::fetch_rows(p, sql, max_rows, query_timeout).await?;
                Ok(process_rows(columns, rows, max_rows))
            }
        }
    }
}

/// Decode fetched rows and mark truncation. Columns are the statement's
/// projection even when no row came back.
fn process_rows<R: DecodeRow>(
    columns: Vec<String>,
    rows: Vec<R>,
    max_rows: usize,
) -> ExecutionResult {
    let truncated = rows.len() > max_rows;
    if truncated {
        warn!(
            total = rows.len(),
            max_rows, "Result truncated at row cap"
        );
    }

    let decoded: Vec<Vec<ColumnValue>> = rows
        .iter()
        .take(max_rows)
        .map(|r| r.decode_values())
        .collect();

    ExecutionResult {
        columns,
        rows: decoded,
        truncated,
    }
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> GateResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(GateError::from)?);
    }
    Ok(rows)
}

// Per-backend fetch loops. The structure is intentionally parallel so the
// differences between drivers stay obvious.

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        max_rows: usize,
        query_timeout: Duration,
    ) -> GateResult<(Vec<String>, Vec<PgRow>)> {
        use sqlx::{Column, Executor};
        let fetch_limit = max_rows + 1;
        let fetch_all = async {
            let mut rows = Vec::new();
            let mut batches = pool.fetch(sql).take(fetch_limit).chunks(FETCH_BATCH_SIZE);
            while let Some(batch) = batches.next().await {
                rows.extend(collect_rows(batch)?);
            }
            // Zero rows leave nothing to read names from, so re-prepare the
            // statement to recover the projection. Statements that no longer
            // prepare (DDL that just changed the schema) genuinely project
            // nothing.
            let columns = if rows.is_empty() {
                match pool.describe(sql).await {
                    Ok(d) => d.columns().iter().map(|c| c.name().to_string()).collect(),
                    Err(_) => Vec::new(),
                }
            } else {
                rows[0].column_names()
            };
            Ok::<_, GateError>((columns, rows))
        };
        match timeout(query_timeout, fetch_all).await {
            Ok(result) => result,
            Err(_) => Err(GateError::timeout(query_timeout.as_secs())),
        }
    }
}

mod mysql {
    use super::*;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        max_rows: usize,
        query_timeout: Duration,
    ) -> GateResult<(Vec<String>, Vec<MySqlRow>)> {
        use sqlx::{Column, Executor};
        let fetch_limit = max_rows + 1;
        let fetch_all = async {
            let mut rows = Vec::new();
            let mut batches = pool.fetch(sql).take(fetch_limit).chunks(FETCH_BATCH_SIZE);
            while let Some(batch) = batches.next().await {
                rows.extend(collect_rows(batch)?);
            }
            let columns = if rows.is_empty() {
                match pool.describe(sql).await {
                    Ok(d) => d.columns().iter().map(|c| c.name().to_string()).collect(),
                    Err(_) => Vec::new(),
                }
            } else {
                rows[0].column_names()
            };
            Ok::<_, GateError>((columns, rows))
        };
        match timeout(query_timeout, fetch_all).await {
            Ok(result) => result,
            Err(_) => Err(GateError::timeout(query_timeout.as_secs())),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        max_rows: usize,
        query_timeout: Duration,
    ) -> GateResult<(Vec<String>, Vec<SqliteRow>)> {
        use sqlx::{Column, Executor};
        let fetch_limit = max_rows + 1;
        let fetch_all = async {
            let mut rows = Vec::new();
            let mut batches = pool.fetch(sql).take(fetch_limit).chunks(FETCH_BATCH_SIZE);
            while let Some(batch) = batches.next().await {
                rows.extend(collect_rows(batch)?);
            }
            let columns = if rows.is_empty() {
                match pool.describe(sql).await {
                    Ok(d) => d.columns().iter().map(|c| c.name().to_string()).collect(),
                    Err(_) => Vec::new(),
                }
            } else {
                rows[0].column_names()
            };
            Ok::<_, GateError>((columns, rows))
        };
        match timeout(query_timeout, fetch_all).await {
            Ok(result) => result,
            Err(_) => Err(GateError::timeout(query_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::PoolSettings;

    async fn memory_pool() -> DbPool {
        // One connection: each in-memory SQLite connection is its own
        // database.
        let settings = PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            writable: true,
        };
        DbPool::connect("sqlite::memory:", &settings).await.unwrap()
    }

    #[tokio::test]
    async fn test_basic_select() {
        let pool = memory_pool().await;
        let pipeline = ExecutionPipeline::new(Duration::from_secs(5), 100);
        let result = pipeline
            .execute(&pool, "SELECT 1 AS one, 'a' AS letter")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["one", "letter"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], ColumnValue::Int(1));
        assert_eq!(result.rows[0][1], ColumnValue::Text("a".to_string()));
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_empty_result_keeps_projection_columns() {
        let pool = memory_pool().await;
        let pipeline = ExecutionPipeline::new(Duration::from_secs(5), 100);
        let result = pipeline
            .execute(&pool, "SELECT 1 AS id, 'x' AS name WHERE 1 = 0")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name"]);
        assert!(result.rows.is_empty());
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_truncation_at_row_cap() {
        let pool = memory_pool().await;
        let pipeline = ExecutionPipeline::new(Duration::from_secs(5), 3);
        let result = pipeline
            .execute(
                &pool,
                "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 10) \
                 SELECT n FROM seq",
            )
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 3);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn test_exactly_max_rows_not_truncated() {
        let pool = memory_pool().await;
        let pipeline = ExecutionPipeline::new(Duration::from_secs(5), 3);
        let result = pipeline
            .execute(
                &pool,
                "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 3) \
                 SELECT n FROM seq",
            )
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 3);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_database_error_propagates() {
        let pool = memory_pool().await;
        let pipeline = ExecutionPipeline::new(Duration::from_secs(5), 100);
        let err = pipeline
            .execute(&pool, "SELECT * FROM no_such_table")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DatabaseError");
        assert!(err.to_string().contains("no_such_table"));
    }
}
