//! SQL Gate MCP Server Library
//!
//! This library exposes a single SQL database to MCP (Model Context
//! Protocol) clients behind a lexical safety policy. Every statement is
//! checked against the policy before it runs, and execution is bounded by a
//! row cap and a wall-clock timeout.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod mcp;
pub mod metrics;
pub mod policy;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{GateError, GateResult};
pub use mcp::GateService;
pub use policy::PolicyEngine;
pub use tools::GateContext;
