//! Audit logging for tool requests.
//!
//! Every request produces exactly one [`AuditRecord`], emitted as a
//! structured tracing event. Records carry a fixed-length digest of the SQL
//! rather than the text itself, so query contents never leak into logs.

use crate::policy::PolicyDecision;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

/// One audit entry per request.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub request_id: Uuid,
    /// Operation name, e.g. "execute_sql".
    pub tool: String,
    /// Opaque client identity; "unknown" when the transport supplies none.
    pub client_id: String,
    /// Truncated SHA-256 of the SQL text. Never the raw SQL.
    pub sql_digest: String,
    pub allowed: bool,
    pub deny_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Present iff the statement was executed.
    pub duration_ms: Option<u64>,
}

impl AuditRecord {
    pub fn new(
        tool: impl Into<String>,
        client_id: impl Into<String>,
        sql_digest: impl Into<String>,
        decision: &PolicyDecision,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tool: tool.into(),
            client_id: client_id.into(),
            sql_digest: sql_digest.into(),
            allowed: decision.is_allowed(),
            deny_reason: decision.reason().map(str::to_string),
            timestamp: Utc::now(),
            duration_ms: None,
        }
    }

    /// Record for a metadata tool call, which carries no caller SQL and is
    /// always allowed.
    pub fn tool_call(tool: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tool: tool.into(),
            client_id: client_id.into(),
            sql_digest: "-".to_string(),
            allowed: true,
            deny_reason: None,
            timestamp: Utc::now(),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Sink for audit records. Emission goes through tracing so the log
/// transport (text or JSON) is decided by the subscriber configured at
/// startup.
#[derive(Debug, Default, Clone)]
pub struct AuditLog;

impl AuditLog {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, record: &AuditRecord) {
        if record.allowed {
            info!(
                target: "audit",
                request_id = %record.request_id,
                tool = %record.tool,
                client = %record.client_id,
                sql_digest = %record.sql_digest,
                timestamp = %record.timestamp.to_rfc3339(),
                duration_ms = record.duration_ms,
                "Query allowed"
            );
        } else {
            warn!(
                target: "audit",
                request_id = %record.request_id,
                tool = %record.tool,
                client = %record.client_id,
                sql_digest = %record.sql_digest,
                timestamp = %record.timestamp.to_rfc3339(),
                reason = record.deny_reason.as_deref().unwrap_or("unknown"),
                "Query denied"
            );
        }
    }
}
