//! Tool implementations.
//!
//! Each tool takes the shared [`GateContext`] and returns a plain string:
//! rendered rows on success, a single `ERROR: <kind>: <detail>` line on
//! failure. The MCP layer in `mcp` wraps these as callable tools; keeping
//! the bodies here leaves them directly testable without a transport.

pub mod query;
pub mod schema;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::db::pool::DbPool;
use crate::db::schema::SchemaInspector;
use crate::db::ExecutionPipeline;
use crate::metrics::MetricsRecorder;
use crate::policy::PolicyEngine;

/// Client identity used when the transport supplies none.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Everything a tool call needs, assembled once at startup.
pub struct GateContext {
    pub config: Config,
    pub pool: DbPool,
    pub policy: PolicyEngine,
    pub pipeline: ExecutionPipeline,
    pub inspector: SchemaInspector,
    pub metrics: Arc<MetricsRecorder>,
    pub audit: AuditLog,
}

impl GateContext {
    pub fn new(config: Config, pool: DbPool) -> Self {
        let policy = PolicyEngine::new(config.mode(), config.max_query_length);
        let pipeline = ExecutionPipeline::new(
            Duration::from_secs(config.query_timeout_secs),
            config.max_rows,
        );
        let inspector = SchemaInspector::new(Duration::from_secs(config.schema_timeout_secs));
        Self {
            config,
            pool,
            policy,
            pipeline,
            inspector,
            metrics: Arc::new(MetricsRecorder::new()),
            audit: AuditLog::new(),
        }
    }
}
