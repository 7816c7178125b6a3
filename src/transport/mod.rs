//! Transport layer for the MCP server.
//!
//! Two transports expose the same tool surface:
//! - Stdio: standard input/output for CLI integration
//! - HTTP: streamable HTTP for web clients, plus operational endpoints

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::error::GateResult;
use std::future::Future;

/// Trait for MCP transport implementations.
pub trait Transport: Send + Sync {
    /// Start the transport and handle requests until shutdown.
    fn run(&self) -> impl Future<Output = GateResult<()>> + Send;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
