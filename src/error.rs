//! Error types for the SQL Gate MCP Server.
//!
//! All errors use `thiserror` and map onto the fixed taxonomy that callers
//! see: `PolicyViolation`, `ConnectionError`, `QueryTimeoutError`,
//! `DatabaseError`, `FormatError`, plus `InternalError` for states that
//! should not be reachable. Tool handlers convert any of these into a
//! single-line `ERROR: <kind>: <detail>` message; internal detail is logged,
//! never echoed to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    /// The policy engine denied the statement before execution.
    #[error("Query not allowed: {reason}")]
    PolicyViolation { reason: String },

    /// A usable connection could not be obtained from the pool.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// Execution was abandoned after the wall-clock deadline.
    #[error("Query execution exceeded {timeout_secs}s timeout")]
    QueryTimeout { timeout_secs: u64 },

    /// Execution-time failure reported by the database engine.
    #[error("{message}")]
    Database {
        message: String,
        /// e.g. "42P01" for undefined table
        sql_state: Option<String>,
    },

    /// Malformed or unsupported output format request.
    #[error("{message}")]
    Format { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GateError {
    pub fn policy(reason: impl Into<String>) -> Self {
        Self::PolicyViolation {
            reason: reason.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(timeout_secs: u64) -> Self {
        Self::QueryTimeout { timeout_secs }
    }

    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable kind tag used for metrics labels and user-facing error lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PolicyViolation { .. } => "PolicyViolation",
            Self::Connection { .. } => "ConnectionError",
            Self::QueryTimeout { .. } => "QueryTimeoutError",
            Self::Database { .. } => "DatabaseError",
            Self::Format { .. } => "FormatError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// The single-line form returned to the calling client.
    pub fn user_line(&self) -> String {
        format!("ERROR: {}: {}", self.kind(), self)
    }
}

/// Convert sqlx errors into the gate taxonomy.
///
/// Acquisition and transport failures become `Connection`; anything the
/// engine reported about the statement becomes `Database` carrying the
/// original message.
impl From<sqlx::Error> for GateError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => GateError::connection(msg.to_string()),
            sqlx::Error::PoolTimedOut => {
                GateError::connection("Timed out acquiring a connection from the pool")
            }
            sqlx::Error::PoolClosed => GateError::connection("Connection pool is closed"),
            sqlx::Error::Io(io_err) => GateError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => GateError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => GateError::connection(format!("Protocol error: {}", msg)),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GateError::database(db_err.message().to_string(), code)
            }
            sqlx::Error::RowNotFound => GateError::database("No rows returned", None),
            sqlx::Error::ColumnNotFound(col) => {
                GateError::database(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => GateError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => GateError::database(
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            sqlx::Error::Decode(source) => {
                GateError::database(format!("Decode error: {}", source), None)
            }
            sqlx::Error::WorkerCrashed => GateError::internal("Database worker crashed"),
            _ => GateError::database(format!("Database error: {}", err), None),
        }
    }
}

/// Result type alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(GateError::policy("x").kind(), "PolicyViolation");
        assert_eq!(GateError::connection("x").kind(), "ConnectionError");
        assert_eq!(GateError::timeout(5).kind(), "QueryTimeoutError");
        assert_eq!(GateError::database("x", None).kind(), "DatabaseError");
        assert_eq!(GateError::format("x").kind(), "FormatError");
    }

    #[test]
    fn test_user_line_shape() {
        let err = GateError::timeout(5);
        assert_eq!(
            err.user_line(),
            "ERROR: QueryTimeoutError: Query execution exceeded 5s timeout"
        );
    }

    #[test]
    fn test_policy_user_line_mentions_reason() {
        let err = GateError::policy("Multi-statement queries are not allowed");
        assert!(err.user_line().contains("Multi-statement"));
        assert!(err.user_line().starts_with("ERROR: PolicyViolation:"));
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err: GateError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.kind(), "ConnectionError");
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err: GateError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), "DatabaseError");
    }
}
