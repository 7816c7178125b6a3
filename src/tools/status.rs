//! Status tools: policy introspection and connectivity probe.

use std::time::{Duration, Instant};

use crate::audit::AuditRecord;
use crate::config::CHECK_CONNECTION_TIMEOUT_SECS;
use crate::error::GateError;
use crate::tools::{GateContext, UNKNOWN_CLIENT};

/// Describe the active policy so a client can see its limits before
/// composing queries. Never touches the database.
pub async fn get_policy_info(ctx: &GateContext) -> String {
    let record = AuditRecord::tool_call("get_policy_info", UNKNOWN_CLIENT);
    ctx.audit.record(&record);
    let info = ctx
        .policy
        .explain(ctx.config.max_rows, ctx.config.query_timeout_secs);
    serde_json::to_string_pretty(&info)
        .unwrap_or_else(|e| GateError::format(format!("JSON serialization failed: {}", e)).user_line())
}

/// Round-trip probe with a short fixed deadline, independent of the query
/// timeout.
pub async fn check_db_connection(ctx: &GateContext) -> String {
    let record = AuditRecord::tool_call("check_db_connection", UNKNOWN_CLIENT);
    let start = Instant::now();
    let probe = ctx
        .inspector
        .check(&ctx.pool, Duration::from_secs(CHECK_CONNECTION_TIMEOUT_SECS))
        .await;
    let elapsed = start.elapsed();
    ctx.audit
        .record(&record.with_duration(elapsed.as_millis() as u64));

    match probe {
        Ok(()) => {
            ctx.metrics
                .record_success("check_db_connection", elapsed, 0);
            format!(
                "✓ Database connection OK ({}, {} ms)",
                ctx.pool.db_type(),
                elapsed.as_millis()
            )
        }
        Err(err) => {
            ctx.metrics
                .record_error("check_db_connection", err.kind(), elapsed);
            format!("✗ Database connection failed: {}", err)
        }
    }
}
