//! Configuration handling for the SQL Gate MCP Server.
//!
//! Configuration is parsed once at startup from CLI arguments and
//! environment variables into an immutable [`Config`] snapshot. Components
//! receive the snapshot (or values from it) at construction time; nothing
//! reads ambient global state after startup.

use clap::{Parser, ValueEnum};

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";

pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SCHEMA_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;

pub const DEFAULT_MAX_ROWS: usize = 50_000;
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 50_000;

/// Row cap for schema/metadata queries, relaxed relative to user queries.
pub const SCHEMA_ROW_LIMIT: usize = 10_000;

/// Fixed timeout for the connectivity probe.
pub const CHECK_CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Defaults and cap for the list_tables limit parameter.
pub const DEFAULT_TABLE_LIMIT: u32 = 200;
pub const MAX_TABLE_LIMIT: u32 = 1000;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// HTTP with streamable responses (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Effective statement posture derived from the two mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    ReadOnly,
    Write,
    Ddl,
}

impl QueryMode {
    /// Resolve the effective mode from the configuration booleans.
    ///
    /// Precedence: `read_only` wins over `enable_writes`. With both flags
    /// off the mode is still `ReadOnly` — the safe default.
    pub fn resolve(read_only: bool, enable_writes: bool) -> Self {
        if read_only {
            QueryMode::ReadOnly
        } else if enable_writes {
            QueryMode::Write
        } else {
            QueryMode::ReadOnly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::Write => "write",
            Self::Ddl => "ddl",
        }
    }
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application configuration, frozen after startup.
#[derive(Debug, Clone, Parser)]
#[command(name = "sqlgate-mcp", version, about = "Policy-gated MCP server for SQL databases")]
pub struct Config {
    /// Database connection URL (postgres://, mysql://, or sqlite:)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Enforce read-only mode. Takes precedence over --enable-writes.
    #[arg(long, env = "READ_ONLY", default_value_t = true, action = clap::ArgAction::Set)]
    pub read_only: bool,

    /// Allow write statements (only effective when --read-only=false)
    #[arg(long, env = "ENABLE_WRITES", default_value_t = false, action = clap::ArgAction::Set)]
    pub enable_writes: bool,

    /// Explicit confirmation required alongside --enable-writes
    #[arg(long, env = "ADMIN_CONFIRM", default_value_t = false, action = clap::ArgAction::Set)]
    pub admin_confirm: bool,

    /// Maximum rows returned per query; excess rows are truncated
    #[arg(long, env = "MAX_ROWS_PER_QUERY", default_value_t = DEFAULT_MAX_ROWS)]
    pub max_rows: usize,

    /// Maximum SQL statement length in characters
    #[arg(long, env = "MAX_QUERY_LENGTH", default_value_t = DEFAULT_MAX_QUERY_LENGTH)]
    pub max_query_length: usize,

    /// Query execution timeout in seconds
    #[arg(long, env = "QUERY_TIMEOUT_SECS", default_value_t = DEFAULT_QUERY_TIMEOUT_SECS)]
    pub query_timeout_secs: u64,

    /// Connection acquisition timeout in seconds (distinct from query timeout)
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Extended timeout for schema discovery queries in seconds
    #[arg(long, env = "SCHEMA_TIMEOUT_SECS", default_value_t = DEFAULT_SCHEMA_TIMEOUT_SECS)]
    pub schema_timeout_secs: u64,

    /// Maximum connections in the pool
    #[arg(long, env = "MAX_POOL_SIZE", default_value_t = DEFAULT_MAX_POOL_SIZE)]
    pub max_pool_size: u32,

    /// Transport mode
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value_t = TransportMode::Stdio)]
    pub transport: TransportMode,

    /// HTTP bind host (http transport only)
    #[arg(long, env = "HTTP_BIND_HOST", default_value = DEFAULT_HTTP_HOST)]
    pub http_host: String,

    /// HTTP bind port (http transport only)
    #[arg(long, env = "HTTP_BIND_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// MCP endpoint path (http transport only)
    #[arg(long, env = "MCP_ENDPOINT", default_value = DEFAULT_MCP_ENDPOINT)]
    pub mcp_endpoint: String,

    /// Log level filter when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "JSON_LOGS", default_value_t = false, action = clap::ArgAction::Set)]
    pub json_logs: bool,
}

impl Config {
    /// Effective query mode per the documented flag precedence.
    pub fn mode(&self) -> QueryMode {
        QueryMode::resolve(self.read_only, self.enable_writes)
    }

    /// Validate critical settings, returning an actionable message on error.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.trim().is_empty() {
            return Err("database URL must be set".to_string());
        }
        if self.enable_writes && !self.admin_confirm {
            return Err("--admin-confirm must be set to enable writes".to_string());
        }
        if self.query_timeout_secs < 1 {
            return Err("query timeout must be >= 1 second".to_string());
        }
        if self.connect_timeout_secs < 1 {
            return Err("connect timeout must be >= 1 second".to_string());
        }
        if self.max_rows < 1 {
            return Err("max rows per query must be >= 1".to_string());
        }
        if self.max_query_length < 1 {
            return Err("max query length must be >= 1".to_string());
        }
        if self.max_pool_size < 1 {
            return Err("max pool size must be >= 1".to_string());
        }
        Ok(())
    }
}
