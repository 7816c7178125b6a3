//! Database access layer.
//!
//! One pool per process, created at startup from the configured URL.
//! Submodules:
//! - `pool`: database-specific connection pools behind a single enum
//! - `types`: backend-agnostic value decoding
//! - `executor`: bounded query execution (row cap + timeout)
//! - `schema`: metadata queries for schemas, tables, and columns

pub mod executor;
pub mod pool;
pub mod schema;
pub mod types;

pub use executor::{ExecutionPipeline, ExecutionResult};
pub use pool::{DatabaseType, DbPool};
