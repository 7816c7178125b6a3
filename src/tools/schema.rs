//! Metadata tools: schema, table, and column listings plus server info.
//!
//! These tools never execute caller-supplied SQL. They run fixed query
//! templates via the schema inspector; listings render as a table, the
//! column inventory as JSON.

use std::time::Instant;

use crate::audit::AuditRecord;
use crate::config::{DEFAULT_TABLE_LIMIT, MAX_TABLE_LIMIT};
use crate::db::ExecutionResult;
use crate::error::{GateError, GateResult};
use crate::format::{self, OutputFormat};
use crate::tools::{GateContext, UNKNOWN_CLIENT};

/// List schemas visible in the connected database.
pub async fn list_schemas(ctx: &GateContext) -> String {
    finish(
        ctx,
        "list_schemas",
        ctx.inspector.list_schemas(&ctx.pipeline, &ctx.pool),
        OutputFormat::Table,
    )
    .await
}

/// List tables and views, optionally filtered to one schema.
///
/// `limit` defaults to 200 and is capped at 1000; zero is rejected rather
/// than silently raised.
pub async fn list_tables(ctx: &GateContext, schema: Option<&str>, limit: Option<u32>) -> String {
    let limit = match validate_limit(limit) {
        Ok(l) => l,
        Err(err) => return err.user_line(),
    };
    finish(
        ctx,
        "list_tables",
        ctx.inspector.list_tables(&ctx.pipeline, &ctx.pool, schema, limit),
        OutputFormat::Table,
    )
    .await
}

/// Column-level inventory as JSON, optionally filtered to one schema.
pub async fn schema_discovery(ctx: &GateContext, schema: Option<&str>) -> String {
    finish(
        ctx,
        "schema_discovery",
        ctx.inspector.schema_discovery(&ctx.pipeline, &ctx.pool, schema),
        OutputFormat::Json,
    )
    .await
}

/// Server identity and effective limits as pretty JSON.
pub async fn get_database_info(ctx: &GateContext) -> String {
    let record = AuditRecord::tool_call("get_database_info", UNKNOWN_CLIENT);
    let start = Instant::now();
    let info = ctx
        .inspector
        .database_info(
            &ctx.pool,
            ctx.config.mode().as_str(),
            ctx.config.max_rows,
            ctx.config.query_timeout_secs,
        )
        .await;
    let elapsed = start.elapsed();
    ctx.audit
        .record(&record.with_duration(elapsed.as_millis() as u64));
    ctx.metrics
        .record_success("get_database_info", elapsed, 0);
    serde_json::to_string_pretty(&info)
        .unwrap_or_else(|e| GateError::format(format!("JSON serialization failed: {}", e)).user_line())
}

fn validate_limit(limit: Option<u32>) -> GateResult<u32> {
    match limit {
        None => Ok(DEFAULT_TABLE_LIMIT),
        Some(0) => Err(GateError::policy("limit must be at least 1")),
        Some(l) => Ok(l.min(MAX_TABLE_LIMIT)),
    }
}

/// Shared tail for metadata tools: audit, metrics, rendering.
async fn finish(
    ctx: &GateContext,
    tool: &str,
    fut: impl std::future::Future<Output = GateResult<ExecutionResult>>,
    format: OutputFormat,
) -> String {
    let record = AuditRecord::tool_call(tool, UNKNOWN_CLIENT);
    let _guard = ctx.metrics.begin_execution();
    let start = Instant::now();
    let outcome = fut.await;
    let elapsed = start.elapsed();
    ctx.audit
        .record(&record.with_duration(elapsed.as_millis() as u64));

    match outcome {
        Ok(result) => {
            ctx.metrics.record_success(tool, elapsed, result.rows.len());
            match format::render(&result.columns, &result.rows, format) {
                Ok(body) => body,
                Err(err) => {
                    ctx.metrics.record_error(tool, err.kind(), elapsed);
                    err.user_line()
                }
            }
        }
        Err(err) => {
            ctx.metrics.record_error(tool, err.kind(), elapsed);
            err.user_line()
        }
    }
}
