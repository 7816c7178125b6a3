//! The execute_sql tool.
//!
//! Request flow is fixed: policy decision, audit record, then bounded
//! execution and rendering. The policy engine is the only component that
//! decides whether SQL runs; execution is reached exclusively through
//! [`execute_sql`], so no statement can bypass it.

use std::time::Instant;

use tracing::debug;

use crate::audit::AuditRecord;
use crate::db::ExecutionResult;
use crate::error::GateResult;
use crate::format::{self, OutputFormat};
use crate::policy::sql_digest;
use crate::tools::{GateContext, UNKNOWN_CLIENT};

const TOOL_NAME: &str = "execute_sql";

/// Run one SQL statement through the gate and render the outcome.
///
/// Always returns a string; failures come back as a single
/// `ERROR: <kind>: <detail>` line rather than a protocol error.
pub async fn execute_sql(ctx: &GateContext, sql: &str, output_format: &str) -> String {
    let digest = sql_digest(sql);
    let decision = ctx.policy.evaluate(sql);
    let record = AuditRecord::new(TOOL_NAME, UNKNOWN_CLIENT, &digest, &decision);

    if !decision.is_allowed() {
        ctx.audit.record(&record);
        ctx.metrics
            .record_blocked(decision.rule_category().unwrap_or("unknown"));
        let err = crate::error::GateError::policy(decision.reason().unwrap_or("denied"));
        return err.user_line();
    }

    let format = match output_format.parse::<OutputFormat>() {
        Ok(f) => f,
        Err(err) => {
            ctx.audit.record(&record);
            ctx.metrics.record_request_error(err.kind());
            return err.user_line();
        }
    };

    let _guard = ctx.metrics.begin_execution();
    let start = Instant::now();
    let outcome = run(ctx, sql, format).await;
    let elapsed = start.elapsed();
    ctx.audit
        .record(&record.with_duration(elapsed.as_millis() as u64));

    match outcome {
        Ok((result, body)) => {
            ctx.metrics
                .record_success(TOOL_NAME, elapsed, result.rows.len());
            debug!(
                rows = result.rows.len(),
                truncated = result.truncated,
                elapsed_ms = elapsed.as_millis() as u64,
                "Query completed"
            );
            let summary =
                format::result_summary(result.rows.len(), result.columns.len(), result.truncated);
            format!("{}\n\n[{}]", body, summary)
        }
        Err(err) => {
            ctx.metrics.record_error(TOOL_NAME, err.kind(), elapsed);
            err.user_line()
        }
    }
}

async fn run(
    ctx: &GateContext,
    sql: &str,
    format: OutputFormat,
) -> GateResult<(ExecutionResult, String)> {
    let result = ctx.pipeline.execute(&ctx.pool, sql).await?;
    let body = format::render(&result.columns, &result.rows, format)?;
    Ok((result, body))
}
